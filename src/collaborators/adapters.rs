//! Collaborators backed by external programs and report files.

use serde::Deserialize;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use super::prompt::render_prompt;
use super::{CandidateDetector, ClassificationRequest, Classifier, CollaboratorError};
use crate::core::{Candidate, Language};

/// Placeholder replaced by the analysed file path in command arguments
pub const FILE_PLACEHOLDER: &str = "{file}";

pub const DEFAULT_REPORT_SUFFIX: &str = ".candidates.json";

/// Detector output is either a bare list or an object with a `candidates`
/// list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DetectorReport {
    List(Vec<Candidate>),
    Wrapped { candidates: Vec<Candidate> },
}

impl DetectorReport {
    fn into_candidates(self) -> Vec<Candidate> {
        match self {
            Self::List(candidates) | Self::Wrapped { candidates } => candidates,
        }
    }
}

pub fn parse_detector_report(json: &str) -> Result<Vec<Candidate>, CollaboratorError> {
    serde_json::from_str::<DetectorReport>(json)
        .map(DetectorReport::into_candidates)
        .map_err(|e| CollaboratorError::Malformed(e.to_string()))
}

fn run_command(
    program: &Path,
    args: Vec<OsString>,
    stdin: Option<&str>,
) -> Result<String, CollaboratorError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let mut child = command.spawn().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            CollaboratorError::Unavailable(format!("{} not found", program.display()))
        }
        _ => CollaboratorError::Io(e),
    })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(CollaboratorError::Failed(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    String::from_utf8(output.stdout).map_err(|e| CollaboratorError::Malformed(e.to_string()))
}

/// Runs an external detector and reads candidates from its JSON stdout
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandDetector {
    /// `args` may contain `{file}`, replaced with the analysed path. When no
    /// argument does, the path is appended.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn arguments_for(&self, path: &Path) -> Vec<OsString> {
        let file = path.as_os_str().to_string_lossy();
        let mut args: Vec<OsString> = self
            .args
            .iter()
            .map(|arg| OsString::from(arg.replace(FILE_PLACEHOLDER, &file)))
            .collect();
        if !self.args.iter().any(|arg| arg.contains(FILE_PLACEHOLDER)) {
            args.push(path.as_os_str().to_owned());
        }
        args
    }
}

impl CandidateDetector for CommandDetector {
    fn detect(&self, path: &Path, language: Language) -> Result<Vec<Candidate>, CollaboratorError> {
        debug!(
            program = %self.program.display(),
            file = %path.display(),
            language = language.as_str(),
            "Running detector"
        );
        let stdout = run_command(&self.program, self.arguments_for(path), None)?;
        parse_detector_report(&stdout)
    }
}

/// Reads a detector report written next to the source file
#[derive(Debug, Clone)]
pub struct ReportFileDetector {
    suffix: String,
}

impl Default for ReportFileDetector {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_SUFFIX)
    }
}

impl ReportFileDetector {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    pub fn report_path(&self, path: &Path) -> PathBuf {
        let mut name = path.file_name().map(OsString::from).unwrap_or_default();
        name.push(&self.suffix);
        path.with_file_name(name)
    }
}

impl CandidateDetector for ReportFileDetector {
    fn detect(&self, path: &Path, _language: Language) -> Result<Vec<Candidate>, CollaboratorError> {
        let report = self.report_path(path);
        let content = std::fs::read_to_string(&report).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                CollaboratorError::Unavailable(format!("no report at {}", report.display()))
            }
            _ => CollaboratorError::Io(e),
        })?;
        parse_detector_report(&content)
    }
}

/// Pipes a rendered prompt to an external program and returns its stdout
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandClassifier {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Classifier for CommandClassifier {
    fn classify(&self, batch: &[ClassificationRequest]) -> Result<String, CollaboratorError> {
        let prompt = render_prompt(batch);
        let args = self.args.iter().map(OsString::from).collect();
        run_command(&self.program, args, Some(&prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PatternType;
    use indoc::indoc;
    use tempfile::TempDir;

    const REPORT: &str = indoc! {r##"
        [
          {
            "file": "kernel.c",
            "line": 14,
            "function": "saxpy",
            "candidate_type": "vectorizable",
            "reason": "simple array arithmetic",
            "suggested_patch": "#pragma omp simd\nfor (...)"
          },
          { "file": "kernel.c", "line": -3, "candidate_type": "mystery" }
        ]
    "##};

    #[test]
    fn test_parse_report_accepts_detector_field_names() {
        let candidates = parse_detector_report(REPORT).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].pattern_type, PatternType::Vectorizable);
        assert_eq!(candidates[0].directive(), Some("#pragma omp simd"));
        assert_eq!(candidates[1].line, 0);
        assert_eq!(candidates[1].pattern_type, PatternType::Unknown);
    }

    #[test]
    fn test_parse_wrapped_report() {
        let json = r#"{"candidates": [{"file": "a.c", "line": 1}]}"#;
        assert_eq!(parse_detector_report(json).unwrap().len(), 1);
        assert!(matches!(
            parse_detector_report("oops"),
            Err(CollaboratorError::Malformed(_))
        ));
    }

    #[test]
    fn test_command_arguments() {
        let detector = CommandDetector::new("detect", vec!["--json".into(), "--input={file}".into()]);
        let args = detector.arguments_for(Path::new("src/k.c"));
        assert_eq!(args, vec![OsString::from("--json"), OsString::from("--input=src/k.c")]);

        let appended = CommandDetector::new("detect", vec!["--json".into()]);
        assert_eq!(appended.arguments_for(Path::new("k.c")).len(), 2);
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let detector = CommandDetector::new("/nonexistent/parascore-detector", Vec::new());
        assert!(matches!(
            detector.detect(Path::new("k.c"), Language::C),
            Err(CollaboratorError::Unavailable(_))
        ));
    }

    #[test]
    fn test_report_file_detector() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("kernel.c");
        std::fs::write(&source, "int main() {}").unwrap();

        let detector = ReportFileDetector::default();
        assert!(matches!(
            detector.detect(&source, Language::C),
            Err(CollaboratorError::Unavailable(_))
        ));

        std::fs::write(detector.report_path(&source), REPORT).unwrap();
        assert_eq!(detector.report_path(&source), temp.path().join("kernel.c.candidates.json"));
        assert_eq!(detector.detect(&source, Language::C).unwrap().len(), 2);
    }
}
