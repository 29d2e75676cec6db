//! JSON output types for CLI responses.
//!
//! Every response is a single JSON document on stdout:
//!
//! 1. **Status first:** `status` is the first field (`"ok"` or `"error"`)
//! 2. **Versioned:** `schema_version` lets consumers detect format changes
//! 3. **Deterministic:** the same inputs produce byte-identical output

use std::io::{self, Write};

use serde::Serialize;

use pyexpose_core::error::{ExposeError, SpecError};
use pyexpose_cpp::module::ModuleArtifacts;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

/// Successful `build` response.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResponse {
    pub status: String,
    pub schema_version: String,
    pub artifacts: ModuleArtifacts,
}

impl BuildResponse {
    pub fn new(artifacts: ModuleArtifacts) -> Self {
        BuildResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            artifacts,
        }
    }
}

/// Error details carried by an [`ErrorResponse`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Numeric error code, also the process exit code.
    pub code: u8,
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn from_error(err: &ExposeError) -> Self {
        let details = match err {
            ExposeError::Spec(SpecError::AmbiguousOverload { first, second }) => {
                Some(serde_json::json!({ "overloads": [first, second] }))
            }
            ExposeError::Spec(SpecError::NotFound { name })
            | ExposeError::Spec(SpecError::WrongKind { name, .. })
            | ExposeError::Spec(SpecError::InvalidIdentifier { name })
            | ExposeError::Spec(SpecError::ReservedIdentifier { name }) => {
                Some(serde_json::json!({ "name": name }))
            }
            ExposeError::InvalidInput { path, .. } | ExposeError::Io { path, .. } => {
                Some(serde_json::json!({ "path": path }))
            }
            _ => None,
        };
        ErrorInfo {
            code: err.error_code().code(),
            message: err.to_string(),
            details,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub schema_version: String,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &ExposeError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_has_status_first() {
        let err = ExposeError::from(SpecError::not_found("geom::Nope"));
        let mut out = Vec::new();
        emit_response(&ErrorResponse::from_error(&err), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.trim_start().starts_with("{\n  \"status\": \"error\""));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["error"]["code"], 3);
        assert_eq!(value["error"]["details"]["name"], "geom::Nope");
    }

    #[test]
    fn internal_error_has_no_details() {
        let info = ErrorInfo::from_error(&ExposeError::internal("unexpected state"));
        assert_eq!(info.code, 10);
        assert!(info.details.is_none());
    }
}
