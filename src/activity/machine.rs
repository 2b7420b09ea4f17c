use std::fmt;
use std::time::{Duration, Instant};

/// What the wrapped process appears to be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    Idle,
    Thinking,
    Waiting,
}

impl IndicatorState {
    pub fn label(self) -> &'static str {
        match self {
            IndicatorState::Idle => "idle",
            IndicatorState::Thinking => "thinking",
            IndicatorState::Waiting => "waiting",
        }
    }
}

impl fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why the machine was re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Output,
    Silence,
    Shutdown,
}

impl Trigger {
    pub fn label(self) -> &'static str {
        match self {
            Trigger::Output => "output",
            Trigger::Silence => "silence",
            Trigger::Shutdown => "shutdown",
        }
    }
}

/// Outcome of offering a candidate to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Unchanged,
    RejectedDwell,
    NoCandidate,
    /// Silence would have idled a waiting prompt; waiting is kept.
    HeldWaiting,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::Unchanged => "unchanged",
            Verdict::RejectedDwell => "rejected_dwell",
            Verdict::NoCandidate => "no_candidate",
            Verdict::HeldWaiting => "held_waiting",
        }
    }
}

/// Debounced three-state machine. Performs no I/O; time is always passed in.
#[derive(Debug)]
pub struct StateMachine {
    current: IndicatorState,
    /// `None` until the first accepted transition, so that one is never held back.
    entered_at: Option<Instant>,
    last_output_at: Instant,
    min_dwell: Duration,
    waiting_timeout: bool,
}

impl StateMachine {
    pub fn new(now: Instant, min_dwell: Duration, waiting_timeout: bool) -> Self {
        Self {
            current: IndicatorState::Idle,
            entered_at: None,
            last_output_at: now,
            min_dwell,
            waiting_timeout,
        }
    }

    pub fn current(&self) -> IndicatorState {
        self.current
    }

    pub fn entered_at(&self) -> Option<Instant> {
        self.entered_at
    }

    pub fn last_output_at(&self) -> Instant {
        self.last_output_at
    }

    pub fn note_output(&mut self, now: Instant) {
        self.last_output_at = now;
    }

    pub fn silence(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_output_at)
    }

    /// Offer a candidate produced by `trigger` at `now`.
    ///
    /// Output triggers can never move the machine to idle; only silence can.
    pub fn offer(
        &mut self,
        candidate: Option<IndicatorState>,
        trigger: Trigger,
        now: Instant,
    ) -> Verdict {
        let Some(target) = candidate else {
            return Verdict::NoCandidate;
        };
        if trigger == Trigger::Output && target == IndicatorState::Idle {
            return Verdict::NoCandidate;
        }
        if target == self.current {
            return Verdict::Unchanged;
        }
        if trigger == Trigger::Silence
            && target == IndicatorState::Idle
            && self.current == IndicatorState::Waiting
            && !self.waiting_timeout
        {
            return Verdict::HeldWaiting;
        }
        if !self.dwell_satisfied(now) {
            return Verdict::RejectedDwell;
        }
        self.current = target;
        self.entered_at = Some(now);
        Verdict::Accepted
    }

    /// Move to `target` without the dwell check. Only used when the run ends.
    pub fn force(&mut self, target: IndicatorState, now: Instant) {
        self.current = target;
        self.entered_at = Some(now);
    }

    fn dwell_satisfied(&self, now: Instant) -> bool {
        self.entered_at
            .is_none_or(|entered| now.saturating_duration_since(entered) >= self.min_dwell)
    }
}
