//! Build configuration and the warning channel.
//!
//! Warnings are recoverable specification oddities. They are collected in a
//! [`Diagnostics`] sink that is passed explicitly to every call site that can
//! warn. When [`BuildConfig::warnings_fatal`] is set, every warning becomes a
//! [`SpecError::PromotedWarning`] instead.

use serde::{Deserialize, Serialize};

use crate::error::{SpecError, SpecResult};

/// Options threaded into a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Promote every warning to a specification error.
    pub warnings_fatal: bool,
    /// Namespace holding `type_<name>` typedefs that pin the scalar types.
    pub probe_namespace: Option<String>,
    /// Whether `long` is wider than `int` when the declaration dump carries no sizes.
    pub default_long_is_wide: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            warnings_fatal: false,
            probe_namespace: None,
            default_long_is_wide: true,
        }
    }
}

/// A recorded warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub message: String,
}

/// Warning sink for one build.
#[derive(Debug, Default)]
pub struct Diagnostics {
    fatal: bool,
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Create a sink honouring the config's fatality setting.
    pub fn new(config: &BuildConfig) -> Self {
        Diagnostics {
            fatal: config.warnings_fatal,
            warnings: Vec::new(),
        }
    }

    /// Report a warning.
    ///
    /// Identical messages are recorded once.
    pub fn warn(&mut self, message: impl Into<String>) -> SpecResult<()> {
        let message = message.into();
        if self.fatal {
            return Err(SpecError::PromotedWarning { message });
        }
        if self.warnings.iter().all(|w| w.message != message) {
            tracing::warn!("{}", message);
            self.warnings.push(Warning { message });
        }
        Ok(())
    }

    /// Warnings recorded so far, in report order.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_warnings_are_recorded_once() {
        let mut diag = Diagnostics::new(&BuildConfig::default());
        diag.warn("helper has the wrong format").unwrap();
        diag.warn("helper has the wrong format").unwrap();
        assert_eq!(diag.warnings().len(), 1);
    }

    #[test]
    fn fatal_mode_promotes_warnings() {
        let config = BuildConfig {
            warnings_fatal: true,
            ..BuildConfig::default()
        };
        let mut diag = Diagnostics::new(&config);
        let err = diag.warn("odd").unwrap_err();
        assert_eq!(
            err,
            SpecError::PromotedWarning {
                message: "odd".to_string()
            }
        );
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: BuildConfig = serde_json::from_str(r#"{"warnings_fatal": true}"#).unwrap();
        assert!(config.warnings_fatal);
        assert!(config.default_long_is_wide);
        assert_eq!(config.probe_namespace, None);
    }
}
