//! Per-point results and run summaries.
//!
//! Results are serializable so a run can be archived as JSON; the text
//! rendering is what `pdt run` prints by default.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::error::DifftestError;
use crate::matrix::MatrixPoint;
use crate::registry::BitField;

/// Identity of a matrix point, as recorded in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointKey {
    pub index: usize,
    pub name: String,
    pub template: String,
    pub opcode: String,
    pub operation: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_field: Option<BitField>,
    pub seed: u64,
}

impl From<&MatrixPoint> for PointKey {
    fn from(p: &MatrixPoint) -> Self {
        Self {
            index: p.index,
            name: p.name.clone(),
            template: p.template_id.clone(),
            opcode: p.opcode(),
            operation: p.op.mnemonic.to_string(),
            ty: p.ty.name.to_string(),
            bit_field: p.bit_field,
            seed: p.seed,
        }
    }
}

/// One element whose device value disagreed with the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementMismatch {
    pub index: usize,
    pub inputs: Vec<String>,
    pub expected: String,
    pub actual: String,
    /// Float distance in units in the last place, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ulp: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Mismatch {
        /// Total mismatching elements; `elements` may be truncated.
        total: usize,
        elements: Vec<ElementMismatch>,
    },
    ExecutionFailure {
        reason: String,
    },
    GenerationFailure {
        reason: String,
    },
}

impl Outcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Mismatch { .. } => "MISMATCH",
            Self::ExecutionFailure { .. } => "EXEC-FAIL",
            Self::GenerationFailure { .. } => "GEN-FAIL",
        }
    }
}

/// Outcome of one matrix point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub point: PointKey,
    pub elements: usize,
    pub outcome: Outcome,
    #[serde(skip)]
    pub expected: Option<Buffer>,
    #[serde(skip)]
    pub actual: Option<Buffer>,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_pass()
    }

    pub fn execution_failure(point: &MatrixPoint, reason: impl Into<String>) -> Self {
        Self {
            point: PointKey::from(point),
            elements: point.len(),
            outcome: Outcome::ExecutionFailure { reason: reason.into() },
            expected: None,
            actual: None,
        }
    }

    pub fn generation_failure(point: &MatrixPoint, reason: impl Into<String>) -> Self {
        Self {
            point: PointKey::from(point),
            elements: point.len(),
            outcome: Outcome::GenerationFailure { reason: reason.into() },
            expected: None,
            actual: None,
        }
    }
}

/// A template skipped for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRejection {
    pub template: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
}

impl Tally {
    fn record(&mut self, passed: bool) {
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub mismatched: usize,
    pub execution_failures: usize,
    pub generation_failures: usize,
    pub rejected_templates: usize,
    pub by_template: BTreeMap<String, Tally>,
    pub by_type: BTreeMap<String, Tally>,
    pub by_operation: BTreeMap<String, Tally>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.total - self.passed
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub seed: u64,
    pub results: Vec<TestResult>,
    pub rejected: Vec<TemplateRejection>,
    pub summary: RunSummary,
}

impl RunReport {
    /// Build a report; results are put in matrix order.
    pub fn new(seed: u64, mut results: Vec<TestResult>, rejected: Vec<TemplateRejection>) -> Self {
        results.sort_by(|a, b| {
            (a.point.template.as_str(), a.point.index).cmp(&(b.point.template.as_str(), b.point.index))
        });
        let summary = summarize(&results, rejected.len());
        Self {
            seed,
            results,
            rejected,
            summary,
        }
    }

    /// True when every point passed and no template was rejected.
    pub fn all_passed(&self) -> bool {
        self.summary.failed() == 0 && self.rejected.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed())
    }
}

fn summarize(results: &[TestResult], rejected_templates: usize) -> RunSummary {
    let mut s = RunSummary {
        total: results.len(),
        rejected_templates,
        ..RunSummary::default()
    };
    for r in results {
        let passed = r.passed();
        match r.outcome {
            Outcome::Pass => s.passed += 1,
            Outcome::Mismatch { .. } => s.mismatched += 1,
            Outcome::ExecutionFailure { .. } => s.execution_failures += 1,
            Outcome::GenerationFailure { .. } => s.generation_failures += 1,
        }
        s.by_template.entry(r.point.template.clone()).or_default().record(passed);
        s.by_type.entry(r.point.ty.clone()).or_default().record(passed);
        s.by_operation.entry(r.point.operation.clone()).or_default().record(passed);
    }
    s
}

/// Render a report as human-readable text.
///
/// Failing points are always listed with their mismatching elements;
/// passing points only when `verbose` is set.
pub fn format_text(report: &RunReport, verbose: bool) -> String {
    let mut out = String::new();
    for rej in &report.rejected {
        let _ = writeln!(out, "REJECTED  {}: {}", rej.template, rej.reason);
    }
    for r in &report.results {
        if r.passed() && !verbose {
            continue;
        }
        let _ = writeln!(out, "{:<9} {} ({} elements)", r.outcome.label(), r.point.name, r.elements);
        match &r.outcome {
            Outcome::Pass => {}
            Outcome::Mismatch { total, elements } => {
                for m in elements {
                    let _ = write!(
                        out,
                        "    [{}] inputs ({}) expected {} got {}",
                        m.index,
                        m.inputs.join(", "),
                        m.expected,
                        m.actual
                    );
                    if let Some(ulp) = m.ulp {
                        let _ = write!(out, " ({ulp} ulp)");
                    }
                    out.push('\n');
                }
                if *total > elements.len() {
                    let _ = writeln!(out, "    ... {} more", total - elements.len());
                }
            }
            Outcome::ExecutionFailure { reason } | Outcome::GenerationFailure { reason } => {
                let _ = writeln!(out, "    {reason}");
            }
        }
    }

    let s = &report.summary;
    let _ = writeln!(out, "\nSeed: {}", report.seed);
    let _ = writeln!(out, "By template:");
    for (name, t) in &s.by_template {
        let _ = writeln!(out, "  {name:<12} {:>5} passed {:>5} failed", t.passed, t.failed);
    }
    let _ = writeln!(out, "By type:");
    for (name, t) in &s.by_type {
        let _ = writeln!(out, "  {name:<12} {:>5} passed {:>5} failed", t.passed, t.failed);
    }
    let _ = writeln!(
        out,
        "\nTotal: {} points, {} passed, {} mismatched, {} execution failures, \
         {} generation failures, {} templates rejected",
        s.total, s.passed, s.mismatched, s.execution_failures, s.generation_failures, s.rejected_templates
    );
    out
}

/// Render a report as pretty JSON.
///
/// # Errors
///
/// Only if serialization itself fails.
pub fn format_json(report: &RunReport) -> Result<String, DifftestError> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(template: &str, index: usize, ty: &str, op: &str) -> PointKey {
        PointKey {
            index,
            name: format!("{template}/{op}.{ty}"),
            template: template.to_string(),
            opcode: format!("{op}.{ty}"),
            operation: op.to_string(),
            ty: ty.to_string(),
            bit_field: None,
            seed: 1,
        }
    }

    fn result(key: PointKey, outcome: Outcome) -> TestResult {
        TestResult {
            point: key,
            elements: 4,
            outcome,
            expected: None,
            actual: None,
        }
    }

    fn sample() -> RunReport {
        RunReport::new(
            9,
            vec![
                result(
                    key("arith", 1, "u32", "sub"),
                    Outcome::Mismatch {
                        total: 3,
                        elements: vec![ElementMismatch {
                            index: 0,
                            inputs: vec!["0x00000001".into(), "0x00000002".into()],
                            expected: "0xffffffff".into(),
                            actual: "0x00000003".into(),
                            ulp: None,
                        }],
                    },
                ),
                result(key("arith", 0, "u32", "add"), Outcome::Pass),
                result(
                    key("shift", 0, "b32", "shl"),
                    Outcome::ExecutionFailure {
                        reason: "timeout after 1s".into(),
                    },
                ),
            ],
            vec![TemplateRejection {
                template: "odd".into(),
                reason: "unresolved <VEC>".into(),
            }],
        )
    }

    #[test]
    fn results_sorted_by_template_then_index() {
        let r = sample();
        let names: Vec<_> = r.results.iter().map(|r| r.point.name.as_str()).collect();
        assert_eq!(names, vec!["arith/add.u32", "arith/sub.u32", "shift/shl.b32"]);
    }

    #[test]
    fn summary_tallies() {
        let s = sample().summary;
        assert_eq!(s.total, 3);
        assert_eq!(s.passed, 1);
        assert_eq!(s.mismatched, 1);
        assert_eq!(s.execution_failures, 1);
        assert_eq!(s.failed(), 2);
        assert_eq!(s.rejected_templates, 1);
        assert_eq!(s.by_template["arith"], Tally { passed: 1, failed: 1 });
        assert_eq!(s.by_type["u32"], Tally { passed: 1, failed: 1 });
        assert_eq!(s.by_operation["shl"], Tally { passed: 0, failed: 1 });
    }

    #[test]
    fn rejection_fails_run() {
        let r = RunReport::new(0, vec![result(key("a", 0, "u32", "add"), Outcome::Pass)], vec![]);
        assert!(r.all_passed());
        assert!(!sample().all_passed());
    }

    #[test]
    fn text_lists_failures_and_truncation() {
        let text = format_text(&sample(), false);
        assert!(text.contains("MISMATCH  arith/sub.u32"));
        assert!(text.contains("expected 0xffffffff got 0x00000003"));
        assert!(text.contains("... 2 more"));
        assert!(text.contains("EXEC-FAIL shift/shl.b32"));
        assert!(text.contains("REJECTED  odd"));
        assert!(!text.contains("PASS"));
        assert!(format_text(&sample(), true).contains("PASS      arith/add.u32"));
    }

    #[test]
    fn json_roundtrip() {
        let report = sample();
        let json = format_json(&report).unwrap();
        assert!(json.contains("\"status\": \"mismatch\""));
        assert!(json.contains("\"type\": \"u32\""));
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary, report.summary);
        assert_eq!(back.results.len(), 3);
        assert_eq!(back.results[1].outcome, report.results[1].outcome);
    }
}
