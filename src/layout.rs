use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::KiraError;
use crate::fs_util::safe_name;

/// Working directories of one submission below an output root:
/// `<root>/<context>/<name>/{validate,process,submit}`.
#[derive(Debug, Clone)]
pub struct SubmissionLayout {
    root: Utf8PathBuf,
    context: String,
    name: String,
}

impl SubmissionLayout {
    pub fn new(root: impl Into<Utf8PathBuf>, context: &str, name: &str) -> Self {
        Self {
            root: root.into(),
            context: safe_name(context),
            name: safe_name(name),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn submission_dir(&self) -> Utf8PathBuf {
        self.root.join(&self.context).join(&self.name)
    }

    pub fn validate_dir(&self) -> Utf8PathBuf {
        self.submission_dir().join("validate")
    }

    pub fn process_dir(&self) -> Utf8PathBuf {
        self.submission_dir().join("process")
    }

    pub fn submit_dir(&self) -> Utf8PathBuf {
        self.submission_dir().join("submit")
    }

    /// Remote directory the files are uploaded to.
    pub fn upload_dir(&self) -> String {
        format!("{}/{}", self.context, self.name)
    }

    pub fn ensure_dirs(&self) -> Result<(), KiraError> {
        for dir in [self.validate_dir(), self.process_dir(), self.submit_dir()] {
            fs::create_dir_all(dir.as_std_path())
                .map_err(|err| KiraError::Filesystem(format!("{dir}: {err}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = SubmissionLayout::new("/out", "genome", "My assembly");
        assert_eq!(layout.submit_dir(), Utf8PathBuf::from("/out/genome/My_assembly/submit"));
        assert_eq!(
            layout.validate_dir(),
            Utf8PathBuf::from("/out/genome/My_assembly/validate")
        );
        assert_eq!(layout.upload_dir(), "genome/My_assembly");
    }

    #[test]
    fn ensure_dirs_creates_tree() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let layout = SubmissionLayout::new(root, "reads", "run/1");
        layout.ensure_dirs().unwrap();
        assert!(layout.process_dir().as_std_path().is_dir());
        assert!(layout.submit_dir().ends_with("reads/run_1/submit"));
    }
}
