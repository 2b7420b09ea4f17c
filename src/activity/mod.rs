//! Turns relay output and silence into debounced state transitions.
//!
//! The monitor is owned by the event loop. It feeds the transcript, asks the
//! pattern set for a candidate, and lets the state machine accept or drop it.

mod machine;

use std::time::{Duration, Instant};

use crate::log_debug_content;
use crate::patterns::{PatternClass, PatternSet};
use crate::transcript::TranscriptBuffer;

pub use machine::{IndicatorState, StateMachine, Trigger, Verdict};

/// Which transcript view a pattern class was evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    ByteWindow,
    LineWindow,
}

impl View {
    pub fn label(self) -> &'static str {
        match self {
            View::ByteWindow => "byte_window",
            View::LineWindow => "line_window",
        }
    }
}

/// One re-evaluation of the machine, as written to the decision trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub trigger: Trigger,
    /// The last pattern class evaluated (the deciding one).
    pub class: Option<PatternClass>,
    pub view: Option<View>,
    pub matched: Option<String>,
    pub candidate: Option<IndicatorState>,
    pub verdict: Verdict,
    /// State after the decision.
    pub state: IndicatorState,
}

impl Decision {
    /// The new state when this decision must reach the indicator.
    pub fn transition(&self) -> Option<IndicatorState> {
        (self.verdict == Verdict::Accepted).then_some(self.state)
    }
}

/// Tunables for [`ActivityMonitor`].
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub byte_window: usize,
    pub prompt_lines: usize,
    pub min_dwell: Duration,
    pub silence_threshold: Duration,
    pub waiting_timeout: bool,
}

pub struct ActivityMonitor {
    buffer: TranscriptBuffer,
    patterns: PatternSet,
    machine: StateMachine,
    silence_threshold: Duration,
    output_since_tick: bool,
}

impl ActivityMonitor {
    pub fn new(patterns: PatternSet, settings: MonitorSettings, now: Instant) -> Self {
        Self {
            buffer: TranscriptBuffer::new(settings.byte_window, settings.prompt_lines),
            patterns,
            machine: StateMachine::new(now, settings.min_dwell, settings.waiting_timeout),
            silence_threshold: settings.silence_threshold,
            output_since_tick: false,
        }
    }

    pub fn state(&self) -> IndicatorState {
        self.machine.current()
    }

    pub fn transcript(&self) -> &TranscriptBuffer {
        &self.buffer
    }

    /// Output trigger: waiting over recent lines first, then thinking over the byte window.
    pub fn on_output(&mut self, chunk: &[u8], now: Instant) -> Decision {
        self.buffer.append(chunk);
        self.machine.note_output(now);
        self.output_since_tick = true;

        let (class, view, matched, candidate) = if let Some(pattern) = self
            .patterns
            .first_match_in_lines(PatternClass::Waiting, self.buffer.line_window())
        {
            (
                PatternClass::Waiting,
                View::LineWindow,
                Some(pattern.to_string()),
                Some(IndicatorState::Waiting),
            )
        } else {
            let text = self.buffer.byte_window_text();
            let matched = self
                .patterns
                .first_match(PatternClass::Thinking, &text)
                .map(str::to_string);
            let candidate = matched.as_ref().map(|_| IndicatorState::Thinking);
            (PatternClass::Thinking, View::ByteWindow, matched, candidate)
        };

        let verdict = self.machine.offer(candidate, Trigger::Output, now);
        self.record(Trigger::Output, Some(class), Some(view), matched, candidate, verdict)
    }

    /// Timer trigger. Returns `None` when output arrived since the previous tick or
    /// the silence threshold has not been exceeded yet.
    pub fn on_tick(&mut self, now: Instant) -> Option<Decision> {
        if std::mem::take(&mut self.output_since_tick) {
            return None;
        }
        if self.machine.silence(now) <= self.silence_threshold {
            return None;
        }
        let matched = self
            .patterns
            .first_match_in_lines(PatternClass::Waiting, self.buffer.line_window())
            .map(str::to_string);
        let candidate = if matched.is_some() {
            IndicatorState::Waiting
        } else {
            IndicatorState::Idle
        };
        let verdict = self.machine.offer(Some(candidate), Trigger::Silence, now);
        Some(self.record(
            Trigger::Silence,
            Some(PatternClass::Waiting),
            Some(View::LineWindow),
            matched,
            Some(candidate),
            verdict,
        ))
    }

    /// Final forced transition to idle, ignoring dwell.
    pub fn shutdown(&mut self, now: Instant) -> Decision {
        self.machine.force(IndicatorState::Idle, now);
        self.record(
            Trigger::Shutdown,
            None,
            None,
            None,
            Some(IndicatorState::Idle),
            Verdict::Accepted,
        )
    }

    fn record(
        &self,
        trigger: Trigger,
        class: Option<PatternClass>,
        view: Option<View>,
        matched: Option<String>,
        candidate: Option<IndicatorState>,
        verdict: Verdict,
    ) -> Decision {
        let decision = Decision {
            trigger,
            class,
            view,
            matched,
            candidate,
            verdict,
            state: self.machine.current(),
        };
        trace_decision(&decision);
        if decision.verdict == Verdict::Accepted {
            if let Some(line) = self.buffer.last_visible_line() {
                log_debug_content(&format!(
                    "state -> {} ({}) last line: {line}",
                    decision.state,
                    trigger.label()
                ));
            }
        }
        decision
    }
}

fn trace_decision(decision: &Decision) {
    let class = decision.class.map_or("none", PatternClass::label);
    let view = decision.view.map_or("none", View::label);
    let matched = decision.matched.as_deref().unwrap_or("none");
    let candidate = decision.candidate.map_or("none", IndicatorState::label);
    // Silence ticks repeat every heartbeat; keep the unchanged ones out of the DEBUG trace.
    if decision.trigger == Trigger::Silence && decision.verdict == Verdict::Unchanged {
        tracing::trace!(
            trigger = decision.trigger.label(),
            class,
            view,
            matched,
            candidate,
            verdict = decision.verdict.label(),
            state = decision.state.label(),
            "decision"
        );
        return;
    }
    tracing::debug!(
        trigger = decision.trigger.label(),
        class,
        view,
        matched,
        candidate,
        verdict = decision.verdict.label(),
        state = decision.state.label(),
        "decision"
    );
}
