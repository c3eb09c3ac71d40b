//! Run-level outcome, serialized for `--json`.

use serde::Serialize;

use ctxgen_shared::{Result, Warning};

use crate::errors::{ErrorCollector, ErrorEntry};

pub const NO_DOCUMENTS_MESSAGE: &str = "No documents found in configuration.";
pub const SUCCESS_MESSAGE: &str = "Documents compiled successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Success,
    Error,
    /// `overwrite: false` and the file existed before the run.
    Skipped,
}

/// Outcome for one declared document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Output root the document was written under.
    pub context_path: String,
    pub output_path: String,
    pub status: DocumentStatus,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prompts: Vec<String>,
    pub result: Vec<DocumentReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    /// Every document error of the run, scoped by output path and source.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEntry>,
}

impl RunReport {
    /// Derive status and message from the per-document results.
    pub fn new(
        imports: Vec<String>,
        prompts: Vec<String>,
        result: Vec<DocumentReport>,
        warnings: Vec<Warning>,
    ) -> Self {
        let failed = result
            .iter()
            .filter(|d| d.status == DocumentStatus::Error)
            .count();
        let (status, message) = if result.is_empty() {
            (RunStatus::Success, NO_DOCUMENTS_MESSAGE.to_string())
        } else if failed == 0 {
            (RunStatus::Success, SUCCESS_MESSAGE.to_string())
        } else {
            (
                RunStatus::Error,
                format!("{failed} of {} documents had errors", result.len()),
            )
        };
        Self {
            status,
            message,
            imports,
            prompts,
            result,
            warnings,
            errors: Vec::new(),
        }
    }

    /// Attach the run-level collector that absorbed every document's errors.
    pub fn with_errors(mut self, errors: &ErrorCollector) -> Self {
        self.errors = errors.all().to_vec();
        self
    }

    pub fn has_errors(&self) -> bool {
        self.status == RunStatus::Error
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ctxgen_shared::CtxgenError::validation(format!("report serialization: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(path: &str, status: DocumentStatus) -> DocumentReport {
        DocumentReport {
            context_path: ".context".into(),
            output_path: path.into(),
            status,
            errors: Vec::new(),
        }
    }

    #[test]
    fn empty_run_is_success() {
        let report = RunReport::new(vec![], vec![], vec![], vec![]);
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.message, NO_DOCUMENTS_MESSAGE);
    }

    #[test]
    fn any_failed_document_fails_the_run() {
        let report = RunReport::new(
            vec![],
            vec![],
            vec![
                doc("a.md", DocumentStatus::Success),
                doc("b.md", DocumentStatus::Error),
                doc("c.md", DocumentStatus::Skipped),
            ],
            vec![],
        );
        assert!(report.has_errors());
        assert_eq!(report.message, "1 of 3 documents had errors");
    }

    #[test]
    fn json_shape_omits_empty_optionals() {
        let report = RunReport::new(vec![], vec![], vec![doc("a.md", DocumentStatus::Success)], vec![]);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["message"], SUCCESS_MESSAGE);
        assert_eq!(value["result"][0]["output_path"], "a.md");
        assert_eq!(value["result"][0]["context_path"], ".context");
        assert!(value.get("imports").is_none());
        assert!(value.get("warnings").is_none());
        assert!(value.get("errors").is_none());
    }

    #[test]
    fn run_level_errors_keep_their_scope() {
        let mut errors = ErrorCollector::new();
        errors.add("b.md#source[1]", "file not found");
        let report = RunReport::new(vec![], vec![], vec![doc("b.md", DocumentStatus::Error)], vec![])
            .with_errors(&errors);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(report.errors.len(), 1);
        assert_eq!(value["errors"][0]["scope"], "b.md#source[1]");
        assert_eq!(value["errors"][0]["message"], "file not found");
    }
}
