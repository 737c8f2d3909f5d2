use crate::linearity::LinearityPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("Invalid analyzer configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("`critical_path_limit` must be at least 1")]
    ZeroCriticalPathLimit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerOptions {
    pub policy: LinearityPolicy,
    /// Input-to-output paths shorter than this (in nodes) are not reported.
    pub critical_path_min_nodes: usize,
    pub critical_path_limit: usize,
    /// Signals with fan-in or fan-out above this are listed as high-fanout.
    pub fan_threshold: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            policy: LinearityPolicy::default(),
            critical_path_min_nodes: 4,
            critical_path_limit: 5,
            fan_threshold: 5,
        }
    }
}

impl AnalyzerOptions {
    /// Loads options from TOML; absent keys keep their defaults.
    ///
    /// ```toml
    /// fan_threshold = 8
    ///
    /// [policy]
    /// linear = ["Plus", "Minus", "Concat", "Partselect"]
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, OptionsError> {
        let options: AnalyzerOptions = toml::from_str(text)?;
        if options.critical_path_limit == 0 {
            return Err(OptionsError::ZeroCriticalPathLimit);
        }
        Ok(options)
    }
}
