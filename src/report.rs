use std::fs::{self, File};
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::KiraError;
use crate::validation::{ValidationMessage, ValidationResult};

/// Plain-text validation report backed by a file.
///
/// Messages are written as they are appended; [`ValidationReport::finish`] flushes
/// and syncs the file. Dropping an unfinished report still flushes the buffer.
pub struct ValidationReport {
    path: Utf8PathBuf,
    writer: BufWriter<File>,
}

impl ValidationReport {
    pub fn create(path: &Utf8Path) -> Result<Self, KiraError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        let file = File::create(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create report {path}: {err}")))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# kira-submit {} report", env!("CARGO_PKG_VERSION"))
            .and_then(|_| writeln!(writer, "# {}", chrono::Utc::now().to_rfc3339()))
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn write_message(&mut self, message: &ValidationMessage) -> Result<(), KiraError> {
        writeln!(self.writer, "{message}").map_err(|err| KiraError::Filesystem(err.to_string()))
    }

    pub fn write_result(&mut self, result: &ValidationResult) -> Result<(), KiraError> {
        for message in result.messages() {
            self.write_message(message)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Result<Utf8PathBuf, KiraError> {
        let file = self
            .writer
            .into_inner()
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        file.sync_all()
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{MessageCode, Origin, ValidationMessage};

    #[test]
    fn writes_one_line_per_message() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("out").join("run.report")).unwrap();

        let mut result = ValidationResult::new();
        result.add(
            ValidationMessage::error(MessageCode::UnknownField, "Unknown field: FOO")
                .with_origin(Origin::line(2)),
        );
        result.info(MessageCode::ValueCorrected, "Value corrected");

        let mut report = ValidationReport::create(&path).unwrap();
        report.write_result(&result).unwrap();
        let written = report.finish().unwrap();

        let content = std::fs::read_to_string(written.as_std_path()).unwrap();
        let lines = content
            .lines()
            .filter(|line| !line.starts_with('#'))
            .collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                "ERROR: Unknown field: FOO [line: 2]",
                "INFO: Value corrected"
            ]
        );
    }
}
