//! Parsing error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Invalid CSS selector for {field}: {selector} - {reason}")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },

    #[error("No valid selectors for {field} ({attempted} attempted)")]
    NoValidSelectors { field: String, attempted: usize },

    #[error("Invalid pattern {name}: {reason}")]
    InvalidPattern { name: String, reason: String },
}

impl ParsingError {
    pub fn invalid_selector(field: &str, selector: &str, reason: &str) -> Self {
        Self::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_pattern(name: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidPattern {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
