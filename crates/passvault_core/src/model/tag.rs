//! Tag taxonomy model.
//!
//! # Invariants
//! - Tag identity (`id`) is immutable; only `name` may change.
//! - Names are trimmed, non-empty and free of whitespace, because the
//!   display form of a record's tags is space separated.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable tag identifier.
pub type TagId = i64;

/// Upper bound for tag names, in characters.
pub const TAG_NAME_MAX_CHARS: usize = 100;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s").expect("valid ws regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Rejected tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValidationError {
    Empty,
    TooLong { max: usize, actual: usize },
    ContainsWhitespace(String),
}

impl Display for TagValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "tag name must not be empty"),
            Self::TooLong { max, actual } => {
                write!(f, "tag name has {actual} characters; maximum is {max}")
            }
            Self::ContainsWhitespace(name) => {
                write!(f, "tag name `{name}` must not contain whitespace")
            }
        }
    }
}

impl Error for TagValidationError {}

/// Trims and validates a tag name. Case is preserved for display.
pub fn normalize_tag_name(raw: &str) -> Result<String, TagValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TagValidationError::Empty);
    }

    let actual = trimmed.chars().count();
    if actual > TAG_NAME_MAX_CHARS {
        return Err(TagValidationError::TooLong {
            max: TAG_NAME_MAX_CHARS,
            actual,
        });
    }

    if WHITESPACE_RE.is_match(trimmed) {
        return Err(TagValidationError::ContainsWhitespace(trimmed.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Orders tags the way every listing presents them: by name ignoring case,
/// then by id.
pub fn sort_tags(tags: &mut [Tag]) {
    tags.sort_by(|left, right| {
        left.name
            .to_lowercase()
            .cmp(&right.name.to_lowercase())
            .then(left.id.cmp(&right.id))
    });
}
