//! FFI use-case API for UI-facing vault calls.
//!
//! # Responsibility
//! - Expose token-based, use-case-level functions to Dart via FRB.
//! - Map core results onto flat response envelopes with stable error codes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Missing and unauthorized records produce identical envelopes.
//! - Search and record envelopes never carry secret values.

use log::warn;
use passvault_core::db::open_db_with_busy_timeout;
use passvault_core::{
    core_version as core_version_inner, init_logging as init_logging_inner,
    init_logging_from_config, ping as ping_inner, PasswordView, Principal, RepoError, SearchQuery,
    SearchService, ServiceError, SqliteAuditSink, Tag, VaultConfig,
};
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::OnceLock;

const DB_PATH_ENV: &str = "PASSVAULT_DB_PATH";
const CONFIG_CONFLICT: &str = "vault already configured; refusing to switch settings";
static VAULT_CONFIG: OnceLock<VaultConfig> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Installs the process-wide vault configuration from a JSON document.
///
/// Starts logging when the config names a `log_dir`. A second call with an
/// identical document is a no-op; a different one is rejected without side
/// effects. Calls made before any config is installed use the environment
/// fallback and do not install it.
///
/// # FFI contract
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_vault(config_json: String) -> String {
    install_vault_config(&VAULT_CONFIG, &config_json)
}

/// Tag visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagItem {
    pub id: i64,
    pub name: String,
}

/// Metadata row of one password record. Has no secret field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordRow {
    pub id: i64,
    pub title: String,
    pub username: String,
    /// Tag names sorted and joined by a single space.
    pub tags_display: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagListResponse {
    pub ok: bool,
    pub items: Vec<TagItem>,
    /// `unavailable|denied` on failure.
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordSearchResponse {
    pub ok: bool,
    pub items: Vec<PasswordRow>,
    /// `unavailable|denied|invalid_query` on failure.
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordResponse {
    pub ok: bool,
    pub record: Option<PasswordRow>,
    pub error_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealResponse {
    pub ok: bool,
    pub value: Option<String>,
    pub error_code: Option<String>,
    pub message: String,
}

/// Lists tags the session's principal may filter by.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn list_tags(principal_token: String) -> TagListResponse {
    list_tags_with(&resolve_vault_config(&VAULT_CONFIG), &principal_token)
}

/// Searches password metadata visible to the session's principal.
///
/// Tag filtering is conjunctive; an empty `tag_ids` applies no tag filter.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn search_passwords(
    principal_token: String,
    free_text: String,
    active_only: bool,
    tag_ids: Vec<i64>,
) -> PasswordSearchResponse {
    let query = SearchQuery::new(free_text)
        .active_only(active_only)
        .with_tags(tag_ids);
    search_passwords_with(&resolve_vault_config(&VAULT_CONFIG), &principal_token, &query)
}

/// Returns metadata of one record.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Missing and unauthorized ids yield the same `denied` envelope.
#[flutter_rust_bridge::frb(sync)]
pub fn get_record(principal_token: String, id: i64) -> RecordResponse {
    get_record_with(&resolve_vault_config(&VAULT_CONFIG), &principal_token, id)
}

/// Discloses the current secret of one record and records an audit event.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Missing and unauthorized ids yield the same `denied` envelope.
/// - No value is returned when the audit event could not be stored.
#[flutter_rust_bridge::frb(sync)]
pub fn reveal_secret(principal_token: String, id: i64) -> RevealResponse {
    reveal_secret_with(&resolve_vault_config(&VAULT_CONFIG), &principal_token, id)
}

fn list_tags_with(config: &VaultConfig, token: &str) -> TagListResponse {
    match with_search_service(config, token, |service, principal| service.list_tags(principal)) {
        Ok(tags) => {
            let items = tags.into_iter().map(to_tag_item).collect::<Vec<_>>();
            TagListResponse {
                message: format!("Found {} tag(s).", items.len()),
                items,
                ok: true,
                error_code: None,
            }
        }
        Err(err) => TagListResponse {
            ok: false,
            items: Vec::new(),
            error_code: Some(err.code().to_string()),
            message: format!("list_tags failed: {err}"),
        },
    }
}

fn search_passwords_with(
    config: &VaultConfig,
    token: &str,
    query: &SearchQuery,
) -> PasswordSearchResponse {
    let result = with_search_service(config, token, |service, principal| {
        service.search(principal, query)
    });
    match result {
        Ok(views) => {
            let items = views.into_iter().map(to_password_row).collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No results.".to_string()
            } else {
                format!("Found {} result(s).", items.len())
            };
            PasswordSearchResponse {
                ok: true,
                items,
                error_code: None,
                message,
            }
        }
        Err(err) => PasswordSearchResponse {
            ok: false,
            items: Vec::new(),
            error_code: Some(err.code().to_string()),
            message: format!("search_passwords failed: {err}"),
        },
    }
}

fn get_record_with(config: &VaultConfig, token: &str, id: i64) -> RecordResponse {
    let result = with_search_service(config, token, |service, principal| {
        service.get_record(principal, id)
    });
    match result {
        Ok(view) => RecordResponse {
            ok: true,
            record: Some(to_password_row(view)),
            error_code: None,
            message: "Record found.".to_string(),
        },
        Err(err) => RecordResponse {
            ok: false,
            record: None,
            error_code: Some(err.code().to_string()),
            message: format!("get_record failed: {err}"),
        },
    }
}

fn reveal_secret_with(config: &VaultConfig, token: &str, id: i64) -> RevealResponse {
    match with_search_service(config, token, |service, principal| service.reveal(principal, id)) {
        Ok(secret) => RevealResponse {
            ok: true,
            value: Some(secret.expose().to_string()),
            error_code: None,
            message: "Secret revealed.".to_string(),
        },
        Err(err) => RevealResponse {
            ok: false,
            value: None,
            error_code: Some(err.code().to_string()),
            message: format!("reveal_secret failed: {err}"),
        },
    }
}

/// Opens one connection for the request and authenticates the token on it.
fn with_search_service<T>(
    config: &VaultConfig,
    token: &str,
    f: impl FnOnce(&SearchService<'_, '_>, &Principal) -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    let conn = open_db_with_busy_timeout(&config.db_path, config.busy_timeout()).map_err(|err| {
        warn!(
            "event=vault_open module=ffi status=error error={}",
            err
        );
        ServiceError::from(RepoError::from(err))
    })?;
    let audit = SqliteAuditSink::new(&conn);
    let service = SearchService::with_config(&conn, &audit, config);
    let principal = service.authenticate(token)?;
    f(&service, &principal)
}

fn install_vault_config(slot: &OnceLock<VaultConfig>, config_json: &str) -> String {
    let config = match VaultConfig::from_json_str(config_json) {
        Ok(config) => config,
        Err(err) => return err.to_string(),
    };
    if let Some(active) = slot.get() {
        return if *active == config {
            String::new()
        } else {
            CONFIG_CONFLICT.to_string()
        };
    }

    if let Err(err) = init_logging_from_config(&config) {
        return err;
    }
    match slot.set(config) {
        Ok(()) => String::new(),
        Err(config) if slot.get() == Some(&config) => String::new(),
        Err(_) => CONFIG_CONFLICT.to_string(),
    }
}

/// Installed config, or the environment fallback computed for this call.
fn resolve_vault_config(slot: &OnceLock<VaultConfig>) -> Cow<'_, VaultConfig> {
    match slot.get() {
        Some(config) => Cow::Borrowed(config),
        None => Cow::Owned(fallback_vault_config()),
    }
}

fn fallback_vault_config() -> VaultConfig {
    let mut config = VaultConfig::default();
    if let Ok(raw) = std::env::var(DB_PATH_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            config.db_path = PathBuf::from(trimmed);
        }
    }
    config
}

fn to_tag_item(tag: Tag) -> TagItem {
    TagItem {
        id: tag.id,
        name: tag.name,
    }
}

fn to_password_row(view: PasswordView) -> PasswordRow {
    PasswordRow {
        id: view.id,
        title: view.title,
        username: view.username,
        tags_display: view.tags_display,
        notes: view.notes,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        core_version, get_record_with, init_logging, install_vault_config, list_tags_with, ping,
        resolve_vault_config, reveal_secret_with, search_passwords_with, CONFIG_CONFLICT,
    };
    use passvault_core::db::open_db;
    use std::sync::OnceLock;
    use passvault_core::{
        AccessGrant, GrantRepository, PasswordDraft, PasswordRepository, Permissions,
        PrincipalRepository, SearchQuery, SecretRepository, SqliteGrantRepository,
        SqlitePasswordRepository, SqlitePrincipalRepository, SqliteSecretRepository,
        SqliteTagRepository, Subject, TagRepository, VaultConfig,
    };

    struct Fixture {
        _dir: tempfile::TempDir,
        config: VaultConfig,
        token: String,
        listed_only: i64,
        revealable: i64,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = VaultConfig {
            db_path: dir.path().join("vault.sqlite3"),
            ..VaultConfig::default()
        };
        let conn = open_db(&config.db_path).unwrap();
        let principals = SqlitePrincipalRepository::try_new(&conn).unwrap();
        let passwords = SqlitePasswordRepository::try_new(&conn).unwrap();
        let secrets = SqliteSecretRepository::try_new(&conn).unwrap();
        let grants = SqliteGrantRepository::try_new(&conn).unwrap();
        let tags = SqliteTagRepository::try_new(&conn).unwrap();

        let alice = principals.create_principal("alice").unwrap();
        let token = principals.issue_session(alice.id).unwrap();
        let infra = tags.create_tag("infra").unwrap();

        let listed_only = passwords
            .create_password(&PasswordDraft::new("DB Prod").username("dba"))
            .unwrap();
        passwords.set_password_tags(listed_only, &[infra.id]).unwrap();
        secrets.store_secret(listed_only, "prod-secret").unwrap();
        grants
            .put_grant(&AccessGrant::new(
                listed_only,
                Subject::Principal(alice.id),
                Permissions::LIST,
            ))
            .unwrap();

        let revealable = passwords
            .create_password(&PasswordDraft::new("Mail"))
            .unwrap();
        secrets.store_secret(revealable, "mail-secret").unwrap();
        grants
            .put_grant(&AccessGrant::new(
                revealable,
                Subject::Principal(alice.id),
                Permissions::LIST_AND_REVEAL,
            ))
            .unwrap();

        Fixture {
            _dir: dir,
            config,
            token,
            listed_only,
            revealable,
        }
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn list_tags_returns_visible_tags() {
        let fx = fixture();
        let response = list_tags_with(&fx.config, &fx.token);
        assert!(response.ok, "{}", response.message);
        let names = response
            .items
            .iter()
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["infra"]);
    }

    #[test]
    fn search_returns_metadata_rows_without_secrets() {
        let fx = fixture();
        let response = search_passwords_with(&fx.config, &fx.token, &SearchQuery::new("db"));
        assert!(response.ok, "{}", response.message);
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].title, "DB Prod");
        assert_eq!(response.items[0].tags_display, "infra");
        assert!(!format!("{response:?}").contains("prod-secret"));
    }

    #[test]
    fn over_long_free_text_is_invalid_query() {
        let fx = fixture();
        let query = SearchQuery::new("x".repeat(1001));
        let response = search_passwords_with(&fx.config, &fx.token, &query);
        assert!(!response.ok);
        assert_eq!(response.error_code.as_deref(), Some("invalid_query"));
    }

    #[test]
    fn reveal_discloses_granted_secret() {
        let fx = fixture();
        let response = reveal_secret_with(&fx.config, &fx.token, fx.revealable);
        assert!(response.ok, "{}", response.message);
        assert_eq!(response.value.as_deref(), Some("mail-secret"));
    }

    #[test]
    fn missing_and_unauthorized_ids_share_one_envelope() {
        let fx = fixture();
        let denied = reveal_secret_with(&fx.config, &fx.token, fx.listed_only);
        let missing = reveal_secret_with(&fx.config, &fx.token, 9_999);
        assert_eq!(denied, missing);
        assert_eq!(denied.error_code.as_deref(), Some("denied"));

        let missing_record = get_record_with(&fx.config, &fx.token, 9_999);
        assert!(!missing_record.ok);
        assert_eq!(missing_record.error_code.as_deref(), Some("denied"));
        assert!(get_record_with(&fx.config, &fx.token, fx.listed_only).ok);
    }

    #[test]
    fn unknown_token_is_denied() {
        let fx = fixture();
        let response = list_tags_with(&fx.config, "not-a-session");
        assert!(!response.ok);
        assert_eq!(response.error_code.as_deref(), Some("denied"));
    }

    #[test]
    fn fallback_config_does_not_claim_the_slot() {
        let slot = OnceLock::new();
        let fallback = resolve_vault_config(&slot);
        assert_eq!(fallback.max_free_text_chars, 1000);
        assert!(slot.get().is_none());

        assert_eq!(install_vault_config(&slot, r#"{"max_free_text_chars": 64}"#), "");
        assert_eq!(resolve_vault_config(&slot).max_free_text_chars, 64);
    }

    #[test]
    fn configure_accepts_identical_document_and_rejects_a_different_one() {
        let slot = OnceLock::new();
        let document = r#"{"max_free_text_chars": 64, "busy_timeout_ms": 250}"#;
        assert_eq!(install_vault_config(&slot, document), "");
        assert_eq!(install_vault_config(&slot, document), "");

        let conflict = install_vault_config(&slot, r#"{"max_free_text_chars": 65}"#);
        assert_eq!(conflict, CONFIG_CONFLICT);
        assert_eq!(resolve_vault_config(&slot).max_free_text_chars, 64);
    }

    #[test]
    fn rejected_config_does_not_start_logging() {
        let slot = OnceLock::new();
        assert_eq!(install_vault_config(&slot, r#"{"max_free_text_chars": 64}"#), "");

        let log_dir = tempfile::tempdir().unwrap();
        let document = format!(r#"{{"log_dir": "{}"}}"#, log_dir.path().display());
        assert_eq!(install_vault_config(&slot, &document), CONFIG_CONFLICT);
        assert_eq!(std::fs::read_dir(log_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn malformed_config_is_reported_and_not_installed() {
        let slot = OnceLock::new();
        let error = install_vault_config(&slot, r#"{"max_free_text_chars": 0}"#);
        assert!(error.contains("max_free_text_chars"));
        assert!(!install_vault_config(&slot, "not json").is_empty());
        assert!(slot.get().is_none());
    }
}
