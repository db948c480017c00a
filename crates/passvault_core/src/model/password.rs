//! Password record metadata and secret values.
//!
//! # Responsibility
//! - Describe the searchable, listable part of a stored password.
//! - Keep the secret value in its own type that is never serialized.
//!
//! # Invariants
//! - `PasswordRecord` and `PasswordView` never contain a secret value.
//! - `SecretValue` debug output is redacted and its buffer is wiped on drop.
//! - Record tags are kept sorted by name (case-insensitive) then id.

use crate::model::tag::{Tag, TagId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use zeroize::Zeroize;

/// Stable password record identifier. The secret table is keyed by it.
pub type PasswordId = i64;

pub const TITLE_MAX_CHARS: usize = 100;
pub const USERNAME_MAX_CHARS: usize = 64;
pub const NOTES_MAX_CHARS: usize = 1000;

/// Stored password metadata, as loaded from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordRecord {
    pub id: PasswordId,
    pub title: String,
    pub username: String,
    pub notes: String,
    pub tags: Vec<Tag>,
    pub active: bool,
}

impl PasswordRecord {
    /// True when every id in `required` is attached to this record.
    pub fn has_all_tags(&self, required: &BTreeSet<TagId>) -> bool {
        required
            .iter()
            .all(|tag_id| self.tags.iter().any(|tag| tag.id == *tag_id))
    }

    /// Case-insensitive substring match over title, username and notes.
    ///
    /// `needle_lower` must already be lowercased.
    pub fn matches_text(&self, needle_lower: &str) -> bool {
        [&self.title, &self.username, &self.notes]
            .iter()
            .any(|field| field.to_lowercase().contains(needle_lower))
    }

    /// Tag names joined by a single space.
    pub fn tags_display(&self) -> String {
        self.tags
            .iter()
            .map(|tag| tag.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Metadata projection handed across the service boundary.
    pub fn to_view(&self) -> PasswordView {
        PasswordView {
            id: self.id,
            title: self.title.clone(),
            username: self.username.clone(),
            tags_display: self.tags_display(),
            notes: self.notes.clone(),
        }
    }
}

/// Metadata row for list and detail screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordView {
    pub id: PasswordId,
    pub title: String,
    pub username: String,
    pub tags_display: String,
    pub notes: String,
}

/// Input for creating or updating record metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordDraft {
    pub title: String,
    pub username: String,
    pub notes: String,
}

impl PasswordDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Returns a trimmed copy that satisfies the field limits.
    pub fn validated(&self) -> Result<Self, PasswordValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(PasswordValidationError::EmptyTitle);
        }
        check_len("title", title, TITLE_MAX_CHARS)?;
        let username = self.username.trim();
        check_len("username", username, USERNAME_MAX_CHARS)?;
        check_len("notes", &self.notes, NOTES_MAX_CHARS)?;

        Ok(Self {
            title: title.to_string(),
            username: username.to_string(),
            notes: self.notes.clone(),
        })
    }
}

fn check_len(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), PasswordValidationError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(PasswordValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

/// Rejected record metadata or secret input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordValidationError {
    EmptyTitle,
    EmptySecret,
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
}

impl Display for PasswordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "password title must not be empty"),
            Self::EmptySecret => write!(f, "secret value must not be empty"),
            Self::TooLong { field, max, actual } => {
                write!(f, "{field} has {actual} characters; maximum is {max}")
            }
        }
    }
}

impl Error for PasswordValidationError {}

/// Plaintext secret of one record at one version.
pub struct SecretValue {
    version: u32,
    value: String,
}

impl SecretValue {
    pub fn new(version: u32, value: String) -> Self {
        Self { version, value }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Borrows the plaintext. Callers must not log it.
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl Debug for SecretValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValue")
            .field("version", &self.version)
            .field("value", &"<redacted>")
            .finish()
    }
}

impl Drop for SecretValue {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::{PasswordDraft, PasswordRecord, PasswordValidationError, SecretValue};
    use crate::model::tag::Tag;
    use std::collections::BTreeSet;

    fn record() -> PasswordRecord {
        PasswordRecord {
            id: 1,
            title: "DB Prod".to_string(),
            username: "Admin".to_string(),
            notes: "primary cluster".to_string(),
            tags: vec![
                Tag {
                    id: 1,
                    name: "db".to_string(),
                },
                Tag {
                    id: 2,
                    name: "prod".to_string(),
                },
            ],
            active: true,
        }
    }

    #[test]
    fn text_match_is_case_insensitive_across_fields() {
        let record = record();
        assert!(record.matches_text("db"));
        assert!(record.matches_text("admin"));
        assert!(record.matches_text("cluster"));
        assert!(!record.matches_text("staging"));
    }

    #[test]
    fn tag_match_requires_every_selected_tag() {
        let record = record();
        assert!(record.has_all_tags(&BTreeSet::new()));
        assert!(record.has_all_tags(&BTreeSet::from([1, 2])));
        assert!(!record.has_all_tags(&BTreeSet::from([1, 3])));
    }

    #[test]
    fn view_joins_tags_with_spaces() {
        assert_eq!(record().to_view().tags_display, "db prod");
    }

    #[test]
    fn draft_validation_trims_and_bounds_fields() {
        let draft = PasswordDraft::new("  mail  ").username(" bob ");
        let valid = draft.validated().unwrap();
        assert_eq!(valid.title, "mail");
        assert_eq!(valid.username, "bob");

        assert_eq!(
            PasswordDraft::new(" ").validated(),
            Err(PasswordValidationError::EmptyTitle)
        );
        let too_long = PasswordDraft::new("x").notes("n".repeat(1001));
        assert!(matches!(
            too_long.validated(),
            Err(PasswordValidationError::TooLong { field: "notes", .. })
        ));
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SecretValue::new(3, "hunter2".to_string());
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("version: 3"));
        assert_eq!(secret.expose(), "hunter2");
    }
}
