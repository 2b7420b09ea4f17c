use std::process::{Command, Stdio};

use super::{Indicator, Signal};
use crate::activity::IndicatorState;
use crate::config::IndicatorColors;
use crate::error::EmitterError;

/// Runs an external program per signal: `<program> [args] a R G B` for a state,
/// `<program> [args] o` for off. The program's stdio is discarded.
#[derive(Debug, Clone)]
pub struct CommandIndicator {
    program: String,
    args: Vec<String>,
    colors: IndicatorColors,
}

impl CommandIndicator {
    pub fn new(program: String, args: Vec<String>, colors: IndicatorColors) -> Self {
        Self {
            program,
            args,
            colors,
        }
    }

    fn signal_args(&self, signal: Signal) -> Vec<String> {
        let rgb = match signal {
            Signal::Off => return vec!["o".to_string()],
            Signal::State(IndicatorState::Idle) => self.colors.idle,
            Signal::State(IndicatorState::Thinking) => self.colors.thinking,
            Signal::State(IndicatorState::Waiting) => self.colors.waiting,
        };
        let mut args = Vec::with_capacity(4);
        args.push("a".to_string());
        args.extend(rgb.iter().map(u8::to_string));
        args
    }
}

impl Indicator for CommandIndicator {
    fn emit(&mut self, signal: Signal) -> Result<(), EmitterError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .args(self.signal_args(signal))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| EmitterError::Launch {
                program: self.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(EmitterError::Status {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn recorder(label: &str) -> (CommandIndicator, std::path::PathBuf) {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let out = env::temp_dir().join(format!("statuslight_led_{label}_{unique}.txt"));
        let script = format!("printf '%s ' \"$@\" >> '{}'", out.display());
        let indicator = CommandIndicator::new(
            "sh".to_string(),
            vec!["-c".to_string(), script, "led".to_string()],
            IndicatorColors::default(),
        );
        (indicator, out)
    }

    #[test]
    fn state_signal_passes_profile_colour() {
        let (mut indicator, out) = recorder("state");
        indicator
            .emit(Signal::State(IndicatorState::Thinking))
            .expect("emit thinking");
        assert_eq!(fs::read_to_string(&out).unwrap(), "a 255 255 0 ");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn off_signal_passes_o() {
        let (mut indicator, out) = recorder("off");
        indicator.emit(Signal::Off).expect("emit off");
        assert_eq!(fs::read_to_string(&out).unwrap(), "o ");
        let _ = fs::remove_file(out);
    }

    #[test]
    fn custom_colours_are_used() {
        let mut indicator = CommandIndicator::new(
            "led".to_string(),
            Vec::new(),
            IndicatorColors {
                idle: [1, 2, 3],
                ..IndicatorColors::default()
            },
        );
        assert_eq!(
            indicator.signal_args(Signal::State(IndicatorState::Idle)),
            ["a", "1", "2", "3"]
        );
        assert_eq!(
            indicator.signal_args(Signal::State(IndicatorState::Waiting)),
            ["a", "255", "0", "0"]
        );
        indicator.args.push("--port".to_string());
        assert_eq!(indicator.describe(), "led --port");
    }

    #[test]
    fn failing_program_reports_status() {
        let mut indicator =
            CommandIndicator::new("false".to_string(), Vec::new(), IndicatorColors::default());
        let err = indicator.emit(Signal::Off).unwrap_err();
        assert!(matches!(err, EmitterError::Status { .. }));
    }

    #[test]
    fn missing_program_reports_launch_error() {
        let mut indicator = CommandIndicator::new(
            "/nonexistent/statuslight-led".to_string(),
            Vec::new(),
            IndicatorColors::default(),
        );
        let err = indicator.emit(Signal::Off).unwrap_err();
        assert!(matches!(err, EmitterError::Launch { .. }));
        assert!(err.to_string().contains("statuslight-led"));
    }
}
