//! Error types and error code constants for pyexpose.
//!
//! Two disjoint taxonomies live here:
//!
//! - [`SpecError`]: build-time specification errors. Any of these aborts the
//!   whole run; no partial module is ever emitted.
//! - [`RuntimeFailure`]: failures that are *generated into* the glue code and
//!   raised only when the produced extension module runs.
//!
//! [`ExposeError`] is the unified type used by the CLI front door. It bridges
//! specification errors, malformed input documents and I/O failures, and maps
//! each to a stable exit code through [`OutputErrorCode`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Malformed input documents (introspection table, binding plan).
    InvalidInput = 2,
    /// The binding specification is inconsistent with the declarations.
    SpecificationError = 3,
    /// Internal errors (I/O, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Specification Errors
// ============================================================================

/// A build-time specification error.
///
/// Every variant carries the offending name or signature so the message can
/// be reported without further context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// A (possibly qualified) name did not resolve in any enclosing scope.
    #[error("could not find \"{name}\"")]
    NotFound { name: String },

    /// The head of a qualified name resolved to something without members.
    #[error("\"{name}\" is not a namespace, struct, class or union")]
    NotAScope { name: String },

    /// A symbol resolved, but to the wrong kind of declaration.
    #[error("\"{name}\" is not a {expected}")]
    WrongKind { name: String, expected: String },

    /// `Base::member` named a class that is not a base of the receiver.
    #[error("\"{base}\" is not a base class of \"{class}\"")]
    NotABaseClass { base: String, class: String },

    /// A declaration referenced an identifier the introspection table never defined.
    #[error("reference to undefined declaration \"{key}\"")]
    DanglingReference { key: String },

    /// No native-to-runtime conversion is registered for a type.
    #[error("No conversion from \"{ty}\" to \"PyObject*\" is registered")]
    NoToRuntimeConversion { ty: String },

    /// No runtime-to-native conversion is registered for a type.
    #[error("No conversion from \"PyObject*\" to \"{ty}\" is registered")]
    NoFromRuntimeConversion { ty: String },

    /// Two overloads reduce to the same sequence of runtime argument checks.
    #[error(
        "Ambiguous overloads: Overload accepting \"{first}\" and overload with \"{second}\" translate to the same set of Python Arguments."
    )]
    AmbiguousOverload { first: String, second: String },

    /// No constructor was specified and the choice is not unique.
    #[error(
        "There is more than one constructor of \"{class}\" and there is no default. An overload must be specified in the binding plan."
    )]
    NoDefaultConstructor { class: String },

    /// Explicit parameter types matched none of the candidates.
    #[error("No overload of \"{name}\" matches the given arguments. The candidates are:{candidates}")]
    NoMatchingSignature { name: String, candidates: String },

    /// A runtime-side name is not a valid identifier.
    #[error("\"{name}\" is not a valid Python identifier")]
    InvalidIdentifier { name: String },

    /// A runtime-side name is a reserved keyword.
    #[error("\"{name}\" is a reserved identifier")]
    ReservedIdentifier { name: String },

    /// An owning-reference conversion was requested without an owner expression.
    #[error("returning \"{ty}\" by owning reference requires an owner object")]
    MissingOwner { ty: String },

    /// The declaration is unusable for the requested role.
    #[error("{message}")]
    Invalid { message: String },

    /// A warning promoted to an error because warnings are fatal.
    #[error("{message} (warnings are treated as errors)")]
    PromotedWarning { message: String },

    /// A record in the introspection table lacks a required attribute.
    #[error("record \"{key}\" has no \"{attribute}\" attribute")]
    MissingAttribute { key: String, attribute: String },
}

impl SpecError {
    /// Create a not-found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        SpecError::NotFound { name: name.into() }
    }

    /// Create a wrong-kind error.
    pub fn wrong_kind(name: impl Into<String>, expected: impl Into<String>) -> Self {
        SpecError::WrongKind {
            name: name.into(),
            expected: expected.into(),
        }
    }

    /// Create a free-form invalid-specification error.
    pub fn invalid(message: impl Into<String>) -> Self {
        SpecError::Invalid {
            message: message.into(),
        }
    }
}

/// Result type for build-time operations.
pub type SpecResult<T> = Result<T, SpecError>;

// ============================================================================
// Runtime Failures
// ============================================================================

/// A failure raised by generated glue code when the extension module runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeFailure {
    /// The received arguments exhausted every dispatch guard.
    #[error("no overload accepts argument types ({})", received.join(", "))]
    NoMatchingOverload { received: Vec<String> },

    /// Named arguments were passed to a call site with several overloads.
    #[error("keyword arguments are not supported by overloaded functions")]
    UnexpectedKeywordArguments,

    /// Construction of a type whose constructors are all inaccessible.
    #[error("\"{class}\" cannot be instantiated: it has no accessible constructor")]
    InaccessibleConstructor { class: String },

    /// A single-overload call received too few or too many arguments.
    #[error("expected {min} to {max} arguments, got {received}")]
    WrongArgumentCount {
        min: usize,
        max: usize,
        received: usize,
    },

    /// A single-overload call received a keyword it does not declare.
    #[error("unexpected keyword argument \"{name}\"")]
    UnknownKeyword { name: String },

    /// A pure virtual method was called on the exposed base itself.
    #[error("This method is not implemented")]
    NotImplemented,
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the CLI.
#[derive(Debug, Error)]
pub enum ExposeError {
    /// The binding specification is inconsistent with the declarations.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// An input document could not be parsed.
    #[error("invalid input {path}: {source}")]
    InvalidInput {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing a file failed.
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl From<&ExposeError> for OutputErrorCode {
    fn from(err: &ExposeError) -> Self {
        match err {
            ExposeError::Spec(SpecError::MissingAttribute { .. }) => OutputErrorCode::InvalidInput,
            ExposeError::Spec(_) => OutputErrorCode::SpecificationError,
            ExposeError::InvalidInput { .. } => OutputErrorCode::InvalidInput,
            ExposeError::Io { .. } => OutputErrorCode::InternalError,
            ExposeError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl ExposeError {
    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ExposeError::Internal {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> OutputErrorCode {
        OutputErrorCode::from(self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn spec_errors_map_to_specification_error() {
            let err = ExposeError::from(SpecError::not_found("ns::Widget"));
            assert_eq!(err.error_code(), OutputErrorCode::SpecificationError);
            assert_eq!(err.error_code().code(), 3);
        }

        #[test]
        fn missing_attribute_maps_to_invalid_input() {
            let err = ExposeError::from(SpecError::MissingAttribute {
                key: "_12".to_string(),
                attribute: "type".to_string(),
            });
            assert_eq!(err.error_code(), OutputErrorCode::InvalidInput);
        }

        #[test]
        fn internal_maps_to_internal() {
            let err = ExposeError::internal("unexpected state");
            assert_eq!(err.error_code().code(), 10);
        }
    }

    mod error_display {
        use super::*;

        #[test]
        fn not_found_names_the_symbol() {
            assert_eq!(
                SpecError::not_found("geom::Point").to_string(),
                "could not find \"geom::Point\""
            );
        }

        #[test]
        fn ambiguous_overload_cites_both_signatures() {
            let err = SpecError::AmbiguousOverload {
                first: "f(int)".to_string(),
                second: "f(long int)".to_string(),
            };
            let text = err.to_string();
            assert!(text.contains("f(int)"));
            assert!(text.contains("f(long int)"));
        }

        #[test]
        fn no_matching_overload_lists_received_types() {
            let failure = RuntimeFailure::NoMatchingOverload {
                received: vec!["int".to_string(), "float".to_string()],
            };
            assert_eq!(
                failure.to_string(),
                "no overload accepts argument types (int, float)"
            );
        }
    }
}
