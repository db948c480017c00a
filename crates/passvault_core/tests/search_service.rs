use passvault_core::db::open_db_in_memory;
use passvault_core::{
    AccessGrant, AccessPolicy, Action, GrantRepository, LogAuditSink, PasswordDraft,
    PasswordRepository, Permissions, Principal, PrincipalRepository, QueryValidationError,
    RepoError, SearchQuery, SearchService, SecretRepository, ServiceError, SqliteGrantRepository,
    SqlitePasswordRepository, SqlitePrincipalRepository, SqliteSecretRepository,
    SqliteTagRepository, Subject, TagRepository,
};
use rusqlite::Connection;

struct Vault {
    conn: Connection,
    alice: Principal,
}

impl Vault {
    fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let alice = SqlitePrincipalRepository::try_new(&conn)
            .unwrap()
            .create_principal("alice")
            .unwrap();
        Self { conn, alice }
    }

    fn record(&self, title: &str, permissions: Permissions) -> i64 {
        let passwords = SqlitePasswordRepository::try_new(&self.conn).unwrap();
        let id = passwords
            .create_password(&PasswordDraft::new(title).username("svc").notes("rotated yearly"))
            .unwrap();
        if permissions != Permissions::NONE {
            self.grant(id, permissions);
        }
        id
    }

    fn grant(&self, id: i64, permissions: Permissions) {
        SqliteGrantRepository::try_new(&self.conn)
            .unwrap()
            .put_grant(&AccessGrant::new(id, Subject::Principal(self.alice.id), permissions))
            .unwrap();
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<String>, ServiceError> {
        let audit = LogAuditSink;
        let service = SearchService::new(&self.conn, &audit);
        Ok(service
            .search(&self.alice, query)?
            .into_iter()
            .map(|view| view.title)
            .collect())
    }
}

#[test]
fn active_only_search_drops_inactive_records() {
    let vault = Vault::new();
    vault.record("DB Prod", Permissions::LIST);
    let archived = vault.record("DB Archived", Permissions::LIST);
    SqlitePasswordRepository::try_new(&vault.conn)
        .unwrap()
        .set_active(archived, false)
        .unwrap();

    let active = vault.search(&SearchQuery::new("db")).unwrap();
    assert_eq!(active, vec!["DB Prod"]);

    let everything = vault
        .search(&SearchQuery::new("db").active_only(false))
        .unwrap();
    assert_eq!(everything, vec!["DB Archived", "DB Prod"]);
}

#[test]
fn tag_filter_requires_every_selected_tag() {
    let vault = Vault::new();
    let tags = SqliteTagRepository::try_new(&vault.conn).unwrap();
    let t1 = tags.create_tag("prod").unwrap();
    let t2 = tags.create_tag("db").unwrap();

    let passwords = SqlitePasswordRepository::try_new(&vault.conn).unwrap();
    let partial = vault.record("Only prod", Permissions::LIST);
    passwords.set_password_tags(partial, &[t1.id]).unwrap();
    let full = vault.record("Prod database", Permissions::LIST);
    passwords.set_password_tags(full, &[t1.id, t2.id]).unwrap();

    let hits = vault
        .search(&SearchQuery::default().with_tags([t1.id, t2.id]))
        .unwrap();
    assert_eq!(hits, vec!["Prod database"]);

    let unfiltered = vault.search(&SearchQuery::default()).unwrap();
    assert_eq!(unfiltered, vec!["Only prod", "Prod database"]);
}

#[test]
fn every_result_is_listable_by_the_caller() {
    let vault = Vault::new();
    let mut expected = Vec::new();
    for (index, permissions) in [
        Permissions::LIST,
        Permissions::NONE,
        Permissions::LIST_AND_REVEAL,
        Permissions::NONE,
    ]
    .into_iter()
    .enumerate()
    {
        let id = vault.record(&format!("Record {index}"), permissions);
        if permissions.can_list {
            expected.push(id);
        }
    }

    let audit = LogAuditSink;
    let service = SearchService::new(&vault.conn, &audit);
    let views = service.search(&vault.alice, &SearchQuery::default()).unwrap();
    let ids = views.iter().map(|view| view.id).collect::<Vec<_>>();
    assert_eq!(ids, expected);

    let grants = SqliteGrantRepository::try_new(&vault.conn).unwrap();
    let policy = AccessPolicy::load(&grants, &vault.alice).unwrap();
    let passwords = SqlitePasswordRepository::try_new(&vault.conn).unwrap();
    for id in ids {
        let record = passwords.get_password(id).unwrap().unwrap();
        assert!(policy.check(&vault.alice, &record, Action::List));
    }
}

#[test]
fn serialized_results_never_contain_secret_values() {
    let vault = Vault::new();
    let id = vault.record("Mail", Permissions::LIST_AND_REVEAL);
    SqliteSecretRepository::try_new(&vault.conn)
        .unwrap()
        .store_secret(id, "hunter2-very-secret")
        .unwrap();

    let audit = LogAuditSink;
    let service = SearchService::new(&vault.conn, &audit);
    for query in [
        SearchQuery::default(),
        SearchQuery::new("mail"),
        SearchQuery::new("hunter2"),
        SearchQuery::default().active_only(false),
    ] {
        let views = service.search(&vault.alice, &query).unwrap();
        let json = serde_json::to_string(&views).unwrap();
        assert!(!json.contains("hunter2"), "secret leaked into {json}");
    }

    let record = service.get_record(&vault.alice, id).unwrap();
    let json = serde_json::to_value(&record).unwrap();
    assert!(json.get("value").is_none());
    assert!(!json.to_string().contains("hunter2"));
}

#[test]
fn results_are_ordered_by_title_ignoring_case_then_id() {
    let vault = Vault::new();
    let zeta = vault.record("Zeta", Permissions::LIST);
    let beta = vault.record("beta", Permissions::LIST);
    let upper = vault.record("Alpha", Permissions::LIST);
    let lower = vault.record("alpha", Permissions::LIST);
    let upper_again = vault.record("Alpha", Permissions::LIST);

    let audit = LogAuditSink;
    let service = SearchService::new(&vault.conn, &audit);
    let ids = service
        .search(&vault.alice, &SearchQuery::default())
        .unwrap()
        .into_iter()
        .map(|view| view.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![upper, upper_again, lower, beta, zeta]);
}

#[test]
fn free_text_matches_any_metadata_field_ignoring_case() {
    let vault = Vault::new();
    vault.record("Ärger Portal", Permissions::LIST);
    vault.record("Wiki", Permissions::LIST);

    assert_eq!(vault.search(&SearchQuery::new("ärger")).unwrap(), vec!["Ärger Portal"]);
    assert_eq!(
        vault.search(&SearchQuery::new("  ROTATED ")).unwrap(),
        vec!["Wiki", "Ärger Portal"]
    );
    assert!(vault.search(&SearchQuery::new("nothing-like-this")).unwrap().is_empty());
}

#[test]
fn malformed_queries_are_rejected_before_storage() {
    let vault = Vault::new();
    vault.record("Mail", Permissions::LIST);

    let too_long = vault.search(&SearchQuery::new("x".repeat(1001)));
    assert!(matches!(
        too_long,
        Err(ServiceError::Validation(QueryValidationError::FreeTextTooLong {
            max: 1000,
            actual: 1001
        }))
    ));

    let control = vault.search(&SearchQuery::new("mail\u{0007}"));
    assert!(matches!(
        control,
        Err(ServiceError::Validation(QueryValidationError::ControlCharacters))
    ));

    assert!(vault.search(&SearchQuery::new("x".repeat(1000))).is_ok());
}

#[test]
fn revoked_grants_apply_on_the_next_call() {
    let vault = Vault::new();
    let id = vault.record("Mail", Permissions::LIST);
    assert_eq!(vault.search(&SearchQuery::default()).unwrap(), vec!["Mail"]);

    let revoked = SqliteGrantRepository::try_new(&vault.conn)
        .unwrap()
        .revoke_grant(id, Subject::Principal(vault.alice.id))
        .unwrap();
    assert!(revoked);
    assert!(vault.search(&SearchQuery::default()).unwrap().is_empty());
}

#[test]
fn sessions_resolve_to_principals_and_unknown_tokens_are_denied() {
    let vault = Vault::new();
    let principals = SqlitePrincipalRepository::try_new(&vault.conn).unwrap();
    let token = principals.issue_session(vault.alice.id).unwrap();

    let audit = LogAuditSink;
    let service = SearchService::new(&vault.conn, &audit);
    assert_eq!(service.authenticate(&token).unwrap().id, vault.alice.id);
    assert!(matches!(service.authenticate("bogus"), Err(ServiceError::Denied)));

    assert!(principals.revoke_session(&token).unwrap());
    assert!(matches!(service.authenticate(&token), Err(ServiceError::Denied)));
}

#[test]
fn blank_principal_and_group_names_are_rejected() {
    let vault = Vault::new();
    let principals = SqlitePrincipalRepository::try_new(&vault.conn).unwrap();

    assert!(matches!(
        principals.create_principal("   "),
        Err(RepoError::EmptyName("principal"))
    ));
    assert!(matches!(
        principals.create_group(""),
        Err(RepoError::EmptyName("group"))
    ));
    assert!(matches!(
        principals.create_principal(" Alice "),
        Err(RepoError::DuplicateName(_))
    ));
}
