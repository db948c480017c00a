use passvault_core::db::open_db_in_memory;
use passvault_core::{
    AccessGrant, AccessPolicy, GrantRepository, PasswordDraft, PasswordRepository, Permissions,
    Principal, PrincipalRepository, RepoError, SqliteGrantRepository, SqlitePasswordRepository,
    SqlitePrincipalRepository, SqliteTagRepository, Subject, Tag, TagStore,
};
use rusqlite::Connection;

fn tag_store(conn: &Connection) -> TagStore<SqliteTagRepository<'_>, SqlitePasswordRepository<'_>> {
    TagStore::new(
        SqliteTagRepository::try_new(conn).unwrap(),
        SqlitePasswordRepository::try_new(conn).unwrap(),
    )
}

fn visible_names(conn: &Connection, principal: &Principal) -> Vec<String> {
    let grants = SqliteGrantRepository::try_new(conn).unwrap();
    let policy = AccessPolicy::load(&grants, principal).unwrap();
    tag_store(conn)
        .list_tags(principal, &policy)
        .unwrap()
        .into_iter()
        .map(|tag| tag.name)
        .collect()
}

fn record_with_tags(conn: &Connection, title: &str, tags: &[&Tag]) -> i64 {
    let passwords = SqlitePasswordRepository::try_new(conn).unwrap();
    let id = passwords.create_password(&PasswordDraft::new(title)).unwrap();
    let tag_ids = tags.iter().map(|tag| tag.id).collect::<Vec<_>>();
    passwords.set_password_tags(id, &tag_ids).unwrap();
    id
}

fn grant(conn: &Connection, password_id: i64, subject: Subject, permissions: Permissions) {
    SqliteGrantRepository::try_new(conn)
        .unwrap()
        .put_grant(&AccessGrant::new(password_id, subject, permissions))
        .unwrap();
}

#[test]
fn create_tag_normalizes_and_rejects_case_insensitive_duplicates() {
    let conn = open_db_in_memory().unwrap();
    let store = tag_store(&conn);

    let created = store.create_tag("  Infra ").unwrap();
    assert_eq!(created.name, "Infra");

    let duplicate = store.create_tag("infra");
    assert!(matches!(duplicate, Err(RepoError::DuplicateTagName(_))));

    let blank = store.create_tag("   ");
    assert!(matches!(blank, Err(RepoError::InvalidTag(_))));

    let spaced = store.create_tag("two words");
    assert!(matches!(spaced, Err(RepoError::InvalidTag(_))));
}

#[test]
fn rename_keeps_attachments_and_reports_missing_tags() {
    let conn = open_db_in_memory().unwrap();
    let store = tag_store(&conn);
    let alice = SqlitePrincipalRepository::try_new(&conn)
        .unwrap()
        .create_principal("alice")
        .unwrap();

    let tag = store.create_tag("db").unwrap();
    let id = record_with_tags(&conn, "DB Prod", &[&tag]);
    grant(&conn, id, Subject::Principal(alice.id), Permissions::LIST);

    let renamed = store.rename_tag(tag.id, "database").unwrap();
    assert_eq!(renamed.id, tag.id);
    assert_eq!(visible_names(&conn, &alice), vec!["database"]);

    let missing = store.rename_tag(9_999, "ghost");
    assert!(matches!(missing, Err(RepoError::TagNotFound(9_999))));
}

#[test]
fn list_tags_only_exposes_tags_on_listable_records() {
    let conn = open_db_in_memory().unwrap();
    let store = tag_store(&conn);
    let alice = SqlitePrincipalRepository::try_new(&conn)
        .unwrap()
        .create_principal("alice")
        .unwrap();

    let shared = store.create_tag("shared").unwrap();
    let hidden = store.create_tag("payroll").unwrap();
    let unused = store.create_tag("unused").unwrap();

    let visible_id = record_with_tags(&conn, "Wiki", &[&shared]);
    record_with_tags(&conn, "Payroll DB", &[&shared, &hidden]);
    grant(&conn, visible_id, Subject::Principal(alice.id), Permissions::LIST);

    assert_eq!(visible_names(&conn, &alice), vec!["shared"]);

    let all = store
        .list_all_tags()
        .unwrap()
        .into_iter()
        .map(|tag| tag.id)
        .collect::<Vec<_>>();
    assert!(all.contains(&hidden.id));
    assert!(all.contains(&unused.id));
}

#[test]
fn list_tags_is_ordered_and_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let store = tag_store(&conn);
    let alice = SqlitePrincipalRepository::try_new(&conn)
        .unwrap()
        .create_principal("alice")
        .unwrap();

    let zeta = store.create_tag("zeta").unwrap();
    let alpha = store.create_tag("Alpha").unwrap();
    let beta = store.create_tag("beta").unwrap();
    let id = record_with_tags(&conn, "Router", &[&zeta, &alpha, &beta]);
    grant(&conn, id, Subject::Principal(alice.id), Permissions::LIST);

    let first = visible_names(&conn, &alice);
    let second = visible_names(&conn, &alice);
    assert_eq!(first, vec!["Alpha", "beta", "zeta"]);
    assert_eq!(first, second);
}

#[test]
fn group_grants_make_tags_visible_to_members() {
    let conn = open_db_in_memory().unwrap();
    let store = tag_store(&conn);
    let principals = SqlitePrincipalRepository::try_new(&conn).unwrap();
    let bob = principals.create_principal("bob").unwrap();
    let ops = principals.create_group("ops").unwrap();
    principals.add_member(ops, bob.id).unwrap();
    let bob = principals.get_principal(bob.id).unwrap().unwrap();

    let tag = store.create_tag("oncall").unwrap();
    let id = record_with_tags(&conn, "Pager", &[&tag]);
    grant(&conn, id, Subject::Group(ops), Permissions::LIST);

    assert_eq!(visible_names(&conn, &bob), vec!["oncall"]);
}
