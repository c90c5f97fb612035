//! Run configuration, loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Command-line flags override individual fields.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compare::{Comparator, Tolerance};
use crate::error::DifftestError;
use crate::kernels::bitwise::ShiftPolicy;
use crate::matrix::MatrixOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub seed: u64,
    pub random_samples: usize,
    /// Per-point driver timeout.
    pub timeout_ms: u64,
    /// Worker threads; 0 means one per available CPU.
    pub jobs: usize,
    pub float_max_ulp: u64,
    pub shift_policy: ShiftPolicy,
    pub zero_length_bit_fields: bool,
    pub max_reported_mismatches: usize,
    pub driver: Option<DriverConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            random_samples: 64,
            timeout_ms: 10_000,
            jobs: 0,
            float_max_ulp: 0,
            shift_policy: ShiftPolicy::Clamp,
            zero_length_bit_fields: true,
            max_reported_mismatches: 8,
            driver: None,
        }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn matrix_options(&self) -> MatrixOptions {
        MatrixOptions {
            seed: self.seed,
            random_samples: self.random_samples,
            zero_length_bit_fields: self.zero_length_bit_fields,
        }
    }

    pub fn comparator(&self) -> Comparator {
        Comparator::new(
            Tolerance {
                float_max_ulp: self.float_max_ulp,
            },
            self.max_reported_mismatches,
        )
    }
}

/// External driver executable, see [`crate::driver::CommandDriver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    1
}

/// Parse a run configuration file.
///
/// # Errors
///
/// Returns [`DifftestError::Io`] if the file cannot be read,
/// or [`DifftestError::Yaml`] if the YAML is malformed.
pub fn parse_config(path: &Path) -> Result<RunConfig, DifftestError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse a run configuration from a string. Blank input yields defaults.
pub fn parse_config_str(yaml: &str) -> Result<RunConfig, DifftestError> {
    if yaml.trim().is_empty() {
        return Ok(RunConfig::default());
    }
    let config: RunConfig = serde_yaml::from_str(yaml)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_default() {
        assert_eq!(parse_config_str("").unwrap(), RunConfig::default());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let c = parse_config_str("seed: 7\nshift_policy: mask\n").unwrap();
        assert_eq!(c.seed, 7);
        assert_eq!(c.shift_policy, ShiftPolicy::Mask);
        assert_eq!(c.random_samples, 64);
        assert_eq!(c.timeout(), Duration::from_secs(10));
        assert!(c.zero_length_bit_fields);
    }

    #[test]
    fn driver_section() {
        let yaml = r#"
driver:
  program: /opt/ptx-runner
  args: ["--device", "0"]
"#;
        let c = parse_config_str(yaml).unwrap();
        let d = c.driver.unwrap();
        assert_eq!(d.program, "/opt/ptx-runner");
        assert_eq!(d.args, vec!["--device", "0"]);
        assert_eq!(d.concurrency, 1);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(parse_config_str("sed: 1\n"), Err(DifftestError::Yaml(_))));
    }

    #[test]
    fn options_follow_fields() {
        let c = RunConfig {
            seed: 3,
            random_samples: 5,
            zero_length_bit_fields: false,
            ..RunConfig::default()
        };
        let m = c.matrix_options();
        assert_eq!((m.seed, m.random_samples, m.zero_length_bit_fields), (3, 5, false));
    }

    #[test]
    fn parse_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "float_max_ulp: 2\njobs: 4\n").unwrap();
        let c = parse_config(&path).unwrap();
        assert_eq!(c.float_max_ulp, 2);
        assert_eq!(c.jobs, 4);
    }
}
