//! Request validation.
//!
//! Every analysis request passes through [`validate_request`] before the
//! scheduler sees it.

use crate::config::LimitsConfig;
use crate::models::Language;
use thiserror::Error;

/// Reason a request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No code provided")]
    EmptyCode,

    #[error("Unsupported language: {language}. Supported: {}", .supported.join(", "))]
    UnsupportedLanguage {
        language: String,
        supported: Vec<String>,
    },

    #[error("Code too large: {size} bytes (limit {limit} bytes)")]
    CodeTooLarge { size: usize, limit: usize },
}

/// Check a request and resolve its language.
///
/// Checks run in order: empty code, then language, then size.
pub fn validate_request(
    code: &str,
    language: &str,
    limits: &LimitsConfig,
) -> Result<Language, ValidationError> {
    if code.is_empty() {
        return Err(ValidationError::EmptyCode);
    }

    let unsupported = || ValidationError::UnsupportedLanguage {
        language: language.to_string(),
        supported: limits
            .supported_languages
            .iter()
            .map(|l| l.as_str().to_string())
            .collect(),
    };
    let lang: Language = language.parse().map_err(|_| unsupported())?;
    if !limits.supported_languages.contains(&lang) {
        return Err(unsupported());
    }

    if code.len() > limits.max_code_size {
        return Err(ValidationError::CodeTooLarge {
            size: code.len(),
            limit: limits.max_code_size,
        });
    }

    Ok(lang)
}
