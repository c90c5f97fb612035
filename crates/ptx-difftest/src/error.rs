use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DifftestError {
    #[error("Failed to read template input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid point filter: {0}")]
    Filter(#[from] regex::Error),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Template {template} references unresolved placeholder <{placeholder}>")]
    UnresolvedPlaceholder { template: String, placeholder: String },

    #[error("Operation {operation} does not support type {ty}")]
    UnsupportedCombination { operation: String, ty: String },

    #[error("Malformed template {id}: {reason}")]
    MalformedTemplate { id: String, reason: String },

    #[error("Duplicate template ID: {0}")]
    DuplicateTemplate(String),

    #[error("Registry has no {0}")]
    EmptyRegistry(&'static str),

    #[error("Type profile {name} declares {bytes} byte(s) for {bits} bit(s)")]
    InvalidTypeProfile { name: String, bits: u32, bytes: u32 },

    #[error("Operation {operation} expects {expected} operand(s), got {actual}")]
    OperandCount {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Operation {0} requires a bit-field position and length")]
    MissingBitField(String),
}

/// Why a generated kernel produced no comparable output.
///
/// Always local to one matrix point: recorded as a failing result,
/// never propagated out of a run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionFailure {
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("driver terminated without a response")]
    Disconnected,

    #[error("failed to start driver worker: {0}")]
    Spawn(String),

    #[error("output buffer {name} missing from driver response")]
    MissingOutput { name: String },

    #[error("output buffer {name} has {actual} element(s), expected {expected}")]
    OutputShape {
        name: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Violation {
    pub severity: Severity,
    pub rule: String,
    pub message: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        write!(f, "[{prefix}] {}: {}", self.rule, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_display_error() {
        let v = Violation {
            severity: Severity::Error,
            rule: "TPL-001".to_string(),
            message: "template text is empty".to_string(),
            location: Some("arith".to_string()),
        };
        let s = v.to_string();
        assert!(s.contains("[ERROR]"));
        assert!(s.contains("TPL-001"));
        assert!(s.contains("template text is empty"));
    }

    #[test]
    fn violation_display_warning() {
        let v = Violation {
            severity: Severity::Warning,
            rule: "TPL-005".to_string(),
            message: "unused binding".to_string(),
            location: None,
        };
        assert!(v.to_string().contains("[WARN]"));
    }

    #[test]
    fn unresolved_placeholder_names_template_and_token() {
        let err = DifftestError::UnresolvedPlaceholder {
            template: "bfe".to_string(),
            placeholder: "WIDTH".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("bfe"));
        assert!(s.contains("<WIDTH>"));
    }

    #[test]
    fn unsupported_combination_names_both_sides() {
        let err = DifftestError::UnsupportedCombination {
            operation: "bfe".to_string(),
            ty: "f32".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("bfe"));
        assert!(s.contains("f32"));
    }

    #[test]
    fn io_error_converts() {
        let err: DifftestError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found").into();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn timeout_failure_reports_duration() {
        let f = ExecutionFailure::Timeout(Duration::from_millis(250));
        assert!(f.to_string().contains("timeout"));
        assert!(f.to_string().contains("250ms"));
    }

    #[test]
    fn output_shape_failure() {
        let f = ExecutionFailure::OutputShape {
            name: "output".to_string(),
            expected: 4,
            actual: 3,
        };
        let s = f.to_string();
        assert!(s.contains("output"));
        assert!(s.contains('4'));
        assert!(s.contains('3'));
    }
}
