//! Runtime-side identifier validation.
//!
//! Names given to exposed modules, classes, methods and attributes must be
//! valid identifiers of the target runtime and must not be reserved words.

use pyexpose_core::error::{SpecError, SpecResult};

/// Reserved words of the target runtime.
pub const RESERVED_WORDS: &[&str] = &[
    "and", "as", "assert", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "exec", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "not", "or",
    "pass", "print", "raise", "return", "try", "while", "with", "yield",
];

/// Check if a name is a reserved word.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Validate that a string is a usable runtime identifier.
///
/// Checks:
/// - Non-empty
/// - Starts with an ASCII letter or underscore
/// - Contains only ASCII alphanumerics and underscores
/// - Not a reserved word
///
/// # Examples
///
/// ```
/// use pyexpose_cpp::validation::validate_identifier;
///
/// assert!(validate_identifier("area").is_ok());
/// assert!(validate_identifier("_private").is_ok());
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("2d").is_err());
/// assert!(validate_identifier("print").is_err());
/// ```
pub fn validate_identifier(name: &str) -> SpecResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => (first.is_ascii_alphabetic() || first == '_') && chars.all(is_word_char),
        None => false,
    };
    if !valid {
        return Err(SpecError::InvalidIdentifier {
            name: name.to_string(),
        });
    }
    if is_reserved(name) {
        return Err(SpecError::ReservedIdentifier {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Derive a usable identifier from a host-language name.
///
/// Reserved words get a trailing underscore; otherwise every non-word
/// character becomes an underscore (`operator==` becomes `operator__`).
pub fn backup_name(name: &str) -> String {
    if is_reserved(name) {
        return format!("{name}_");
    }
    name.chars()
        .map(|ch| if is_word_char(ch) { ch } else { '_' })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
