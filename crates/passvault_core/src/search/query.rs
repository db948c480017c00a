//! Search query model and validation.

use crate::model::tag::TagId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Longest accepted free-text input, in characters.
pub const DEFAULT_MAX_FREE_TEXT_CHARS: usize = 1000;

static CONTROL_CHAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Cc}").expect("valid control char regex"));

/// Search request as received from the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Case-insensitive substring over title, username and notes.
    pub free_text: String,
    /// Exclude disabled records.
    pub active_only: bool,
    /// Records must carry every one of these tags.
    pub tag_ids: BTreeSet<TagId>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            free_text: String::new(),
            active_only: true,
            tag_ids: BTreeSet::new(),
        }
    }
}

impl SearchQuery {
    pub fn new(free_text: impl Into<String>) -> Self {
        Self {
            free_text: free_text.into(),
            ..Self::default()
        }
    }

    pub fn active_only(mut self, active_only: bool) -> Self {
        self.active_only = active_only;
        self
    }

    pub fn with_tags(mut self, tag_ids: impl IntoIterator<Item = TagId>) -> Self {
        self.tag_ids.extend(tag_ids);
        self
    }

    /// Rejects malformed input without touching storage.
    pub fn validate(&self, max_free_text_chars: usize) -> Result<(), QueryValidationError> {
        let actual = self.free_text.chars().count();
        if actual > max_free_text_chars {
            return Err(QueryValidationError::FreeTextTooLong {
                max: max_free_text_chars,
                actual,
            });
        }

        if CONTROL_CHAR_RE.is_match(&self.free_text) {
            return Err(QueryValidationError::ControlCharacters);
        }

        Ok(())
    }

    /// Trimmed, lowercased needle; `None` when no text filter applies.
    pub fn normalized_text(&self) -> Option<String> {
        let trimmed = self.free_text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_lowercase())
        }
    }
}

/// Malformed search input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValidationError {
    FreeTextTooLong { max: usize, actual: usize },
    ControlCharacters,
}

impl Display for QueryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FreeTextTooLong { max, actual } => {
                write!(f, "search text has {actual} characters; maximum is {max}")
            }
            Self::ControlCharacters => write!(f, "search text contains control characters"),
        }
    }
}

impl Error for QueryValidationError {}
