use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CheckResult, ProgressEvent, ProgressSink, ValidateResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_validate(result: &ValidateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_check(result: &CheckResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Progress lines on stderr for interactive runs.
pub struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn event(&self, event: ProgressEvent) {
        let message = event.message.trim();
        let message = message.strip_prefix("phase=").unwrap_or(message);
        match event.elapsed {
            Some(elapsed) => eprintln!("[{:>6.2}s] {message}", elapsed.as_secs_f64()),
            None => eprintln!("[  ... ] {message}"),
        }
    }
}
