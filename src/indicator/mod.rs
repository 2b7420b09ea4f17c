//! Indicator emitter: the sink that renders the current state (an RGB light by default).
//!
//! Emission never runs on the relay path. The event loop hands signals to an
//! [`IndicatorWorker`], which calls the concrete [`Indicator`] on its own thread.

mod command;
mod worker;

use std::fmt;

use crate::activity::IndicatorState;
use crate::error::EmitterError;
use crate::log_debug;

pub use command::CommandIndicator;
pub use worker::IndicatorWorker;

/// What the indicator is asked to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    State(IndicatorState),
    /// Explicit "off", sent once when the run ends.
    Off,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::State(state) => write!(f, "{state}"),
            Signal::Off => f.write_str("off"),
        }
    }
}

pub trait Indicator: Send {
    fn emit(&mut self, signal: Signal) -> Result<(), EmitterError>;

    /// Short name for log lines.
    fn describe(&self) -> String;
}

/// Used with `--no-led` or when no indicator program is available.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn emit(&mut self, signal: Signal) -> Result<(), EmitterError> {
        log_debug(&format!("indicator: {signal}"));
        Ok(())
    }

    fn describe(&self) -> String {
        "log only".to_string()
    }
}
