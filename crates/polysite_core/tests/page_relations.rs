use polysite_core::db::open_db_in_memory;
use polysite_core::model::page::validate_handle;
use polysite_core::{
    AddSectionRequest, CreatePageRequest, Locale, Page, PageService, PageServiceError, Section,
    SectionService, SqlitePageRepository, SqliteSectionRepository,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

/// Registers `en_US` (default) and `de_CH` sections; returns (default, second).
fn seed_sections(conn: &Connection) -> (Section, Section) {
    let service = SectionService::new(SqliteSectionRepository::try_new(conn).unwrap());
    let default = service
        .add_section(
            AddSectionRequest::new(Locale::parse("en_US").unwrap(), "Home", "home")
                .with_template("full"),
        )
        .unwrap();
    let second = service
        .add_section(
            AddSectionRequest::new(Locale::parse("de_CH").unwrap(), "Second language", "chde")
                .with_template("full"),
        )
        .unwrap();
    (default, second)
}

fn create_page(service: &PageService<SqlitePageRepository<'_>>, parent: &Page, name: &str) -> Page {
    service
        .create_page(CreatePageRequest::new(parent.page_id, name))
        .unwrap()
}

fn home(service: &PageService<SqlitePageRepository<'_>>, section: &Section) -> Page {
    service.get_page(section.section_id).unwrap().unwrap()
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn duplicate_registers_relation_ids_per_locale() {
    let conn = setup();
    let (default, second) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let old_page = create_page(&service, &default_home, "Old Page");
    let old_relation = service.relation_id(old_page.page_id).unwrap().unwrap();

    let new_page = service
        .duplicate(old_page.page_id, default.section_id)
        .unwrap();
    assert_ne!(
        service.relation_id(old_page.page_id).unwrap(),
        service.relation_id(new_page.page.page_id).unwrap(),
        "a copy in the same locale must get a new relation id"
    );
    assert_ne!(new_page.relation_id, old_relation);

    let translated = service
        .duplicate(old_page.page_id, second.section_id)
        .unwrap();
    assert_eq!(
        service.relation_id(old_page.page_id).unwrap(),
        service.relation_id(translated.page.page_id).unwrap(),
        "a copy in another locale must keep the relation id"
    );
    assert_eq!(translated.relation_id, old_relation);

    service.delete(old_page.page_id).unwrap();
    service.delete(new_page.page.page_id).unwrap();
    service.delete(translated.page.page_id).unwrap();
    assert!(service.get_page(old_page.page_id).unwrap().is_none());
}

#[test]
fn duplicate_copies_page_fields_with_unique_sibling_handle() {
    let conn = setup();
    let (default, _) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let mut request = CreatePageRequest::new(default_home.page_id, "Old Page");
    request.template = Some("full".to_string());
    let old_page = service.create_page(request).unwrap();

    let first_copy = service
        .duplicate(old_page.page_id, default.section_id)
        .unwrap()
        .page;
    let second_copy = service
        .duplicate(old_page.page_id, default.section_id)
        .unwrap()
        .page;

    assert_eq!(first_copy.name, "Old Page");
    assert_eq!(first_copy.template.as_deref(), Some("full"));
    assert_eq!(first_copy.parent_id, Some(default.section_id));
    assert_eq!(old_page.handle, "old-page");
    assert_eq!(first_copy.handle, "old-page-2");
    assert_eq!(second_copy.handle, "old-page-3");
}

#[test]
fn duplicate_into_nested_parent_resolves_target_section() {
    let conn = setup();
    let (default, second) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);
    let second_home = home(&service, &second);

    let parent = create_page(&service, &default_home, "Parent");
    let original = create_page(&service, &parent, "Awesome");
    let second_parent = service.duplicate(parent.page_id, second_home.page_id).unwrap();

    let second_original = service
        .duplicate(original.page_id, second_parent.page.page_id)
        .unwrap();
    assert_eq!(second_original.page.parent_id, Some(second_parent.page.page_id));
    assert_eq!(
        second_original.relation_id,
        service.relation_id(original.page_id).unwrap().unwrap()
    );

    let translated = service
        .translated_page(original.page_id, second.section_id)
        .unwrap()
        .unwrap();
    assert_eq!(translated.page_id, second_original.page.page_id);
}

#[test]
fn duplicate_alias_points_at_translated_original() {
    let conn = setup();
    let (default, second) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let parent = create_page(&service, &default_home, "Parent");
    let original = create_page(&service, &parent, "Awesome");
    let alias_id = service
        .create_alias(original.page_id, default.section_id)
        .unwrap();
    let alias = service.get_page(alias_id).unwrap().unwrap();
    assert_eq!(alias.pointer_id, Some(original.page_id));
    assert_eq!(alias.collection_id(), original.page_id);

    let second_parent = service.duplicate(parent.page_id, second.section_id).unwrap();
    let second_original = service
        .duplicate(original.page_id, second_parent.page.page_id)
        .unwrap();
    let second_alias = service.duplicate(alias_id, second.section_id).unwrap();

    assert!(second_alias.page.is_alias());
    assert_eq!(
        second_alias.page.collection_id(),
        second_original.page.collection_id()
    );
    assert_eq!(second_alias.page.parent_id, Some(second.section_id));
    assert_eq!(second_alias.relation_id, second_original.relation_id);

    service.delete(parent.page_id).unwrap();
    service.delete(alias_id).unwrap_err();
    service.delete(second_parent.page.page_id).unwrap();
    assert!(service.get_page(second_alias.page.page_id).unwrap().is_none());
}

#[test]
fn duplicate_alias_without_translated_original_is_rejected() {
    let conn = setup();
    let (default, second) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let original = create_page(&service, &default_home, "Awesome");
    let alias_id = service
        .create_alias(original.page_id, default.section_id)
        .unwrap();
    let pages_before = count_rows(&conn, "pages");
    let relations_before = count_rows(&conn, "page_relations");

    let err = service.duplicate(alias_id, second.section_id).unwrap_err();
    assert!(matches!(
        err,
        PageServiceError::MissingOriginal {
            alias_id: a,
            original_id: o,
            section_id: s,
        } if a == alias_id && o == original.page_id && s == second.section_id
    ));

    assert_eq!(count_rows(&conn, "pages"), pages_before);
    assert_eq!(count_rows(&conn, "page_relations"), relations_before);
}

#[test]
fn duplicate_rolls_back_page_row_when_relation_insert_fails() {
    let conn = setup();
    let (default, second) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let old_page = create_page(&service, &default_home, "Old Page");
    conn.execute_batch(
        "CREATE TRIGGER reject_relation_insert
         BEFORE INSERT ON page_relations
         BEGIN
            SELECT RAISE(ABORT, 'relation insert rejected');
         END;",
    )
    .unwrap();
    let pages_before = count_rows(&conn, "pages");
    let relations_before = count_rows(&conn, "page_relations");

    let err = service
        .duplicate(old_page.page_id, second.section_id)
        .unwrap_err();
    assert!(matches!(err, PageServiceError::Repo(_)));
    assert_eq!(count_rows(&conn, "pages"), pages_before);
    assert_eq!(count_rows(&conn, "page_relations"), relations_before);
    assert!(service.list_children(second.section_id).unwrap().is_empty());

    conn.execute_batch("DROP TRIGGER reject_relation_insert;")
        .unwrap();
    let copy = service
        .duplicate(old_page.page_id, second.section_id)
        .unwrap();
    assert_eq!(copy.page.handle, "old-page");
    assert_eq!(count_rows(&conn, "pages"), pages_before + 1);
}

#[test]
fn duplicate_keeps_suffixed_handle_within_max_length() {
    let conn = setup();
    let (default, _) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let long_handle = "a".repeat(128);
    let mut request = CreatePageRequest::new(default_home.page_id, "Long");
    request.handle = Some(long_handle.clone());
    let page = service.create_page(request).unwrap();
    assert_eq!(page.handle, long_handle);

    let copy = service
        .duplicate(page.page_id, default.section_id)
        .unwrap()
        .page;
    assert_eq!(copy.handle.len(), 128);
    assert!(copy.handle.ends_with("-2"));
    assert_ne!(copy.handle, page.handle);
    assert!(validate_handle(&copy.handle).is_ok());
}

#[test]
fn duplicate_alias_within_same_section_reuses_original() {
    let conn = setup();
    let (default, _) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let folder = create_page(&service, &default_home, "Folder");
    let original = create_page(&service, &default_home, "Awesome");
    let alias_id = service
        .create_alias(original.page_id, default.section_id)
        .unwrap();

    let copy = service.duplicate(alias_id, folder.page_id).unwrap();
    assert_eq!(copy.page.collection_id(), original.page_id);
    assert_eq!(copy.page.parent_id, Some(folder.page_id));
}

#[test]
fn alias_reports_original_relation_id() {
    let conn = setup();
    let (default, _) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let original = create_page(&service, &default_home, "Awesome");
    let folder = create_page(&service, &default_home, "Folder");
    let alias_id = service.create_alias(original.page_id, folder.page_id).unwrap();

    assert_eq!(
        service.relation_id(alias_id).unwrap(),
        service.relation_id(original.page_id).unwrap()
    );
}

#[test]
fn cross_section_copy_gets_fresh_relation_when_translation_exists() {
    let conn = setup();
    let (default, second) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let page = create_page(&service, &default_home, "About");
    let translation = service.duplicate(page.page_id, second.section_id).unwrap();
    let second_copy = service.duplicate(page.page_id, second.section_id).unwrap();

    assert_eq!(
        translation.relation_id,
        service.relation_id(page.page_id).unwrap().unwrap()
    );
    assert_ne!(second_copy.relation_id, translation.relation_id);

    let members = service.relation_members(translation.relation_id).unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].section_id, default.section_id);
    assert_eq!(members[1].section_id, second.section_id);
}

#[test]
fn duplicate_into_own_subtree_is_rejected() {
    let conn = setup();
    let (default, _) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let parent = create_page(&service, &default_home, "Parent");
    let child = create_page(&service, &parent, "Child");

    let err = service.duplicate(parent.page_id, parent.page_id).unwrap_err();
    assert!(matches!(err, PageServiceError::InvalidTarget { .. }));

    let err = service.duplicate(parent.page_id, child.page_id).unwrap_err();
    assert!(matches!(
        err,
        PageServiceError::InvalidTarget {
            page_id,
            target_parent_id,
        } if page_id == parent.page_id && target_parent_id == child.page_id
    ));
}

#[test]
fn duplicate_rejects_alias_target_and_unknown_pages() {
    let conn = setup();
    let (default, _) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let page = create_page(&service, &default_home, "Page");
    let alias_id = service
        .create_alias(page.page_id, default.section_id)
        .unwrap();

    let err = service.duplicate(page.page_id, alias_id).unwrap_err();
    assert!(matches!(err, PageServiceError::ParentIsAlias(id) if id == alias_id));

    let missing = uuid::Uuid::new_v4();
    let err = service.duplicate(missing, default.section_id).unwrap_err();
    assert!(matches!(err, PageServiceError::PageNotFound(id) if id == missing));

    let err = service.duplicate(page.page_id, missing).unwrap_err();
    assert!(matches!(err, PageServiceError::ParentNotFound(id) if id == missing));
}

#[test]
fn delete_does_not_cascade_to_relation_members() {
    let conn = setup();
    let (default, second) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let page = create_page(&service, &default_home, "Team");
    let relation_id = service.relation_id(page.page_id).unwrap().unwrap();
    let translation = service.duplicate(page.page_id, second.section_id).unwrap();

    service.delete(page.page_id).unwrap();

    assert!(service.relation_id(page.page_id).unwrap().is_none());
    assert_eq!(
        service.relation_id(translation.page.page_id).unwrap(),
        Some(relation_id)
    );
    let members = service.relation_members(relation_id).unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].page.page_id, translation.page.page_id);

    service.delete(translation.page.page_id).unwrap();
    assert!(service.relation_members(relation_id).unwrap().is_empty());
}

#[test]
fn delete_removes_subtree_and_aliases_pointing_into_it() {
    let conn = setup();
    let (default, _) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let parent = create_page(&service, &default_home, "Parent");
    let child = create_page(&service, &parent, "Child");
    let alias_id = service.create_alias(child.page_id, default.section_id).unwrap();

    service.delete(parent.page_id).unwrap();

    assert!(service.get_page(child.page_id).unwrap().is_none());
    assert!(service.get_page(alias_id).unwrap().is_none());
    assert!(service.relation_id(child.page_id).unwrap().is_none());
    let err = service.delete(child.page_id).unwrap_err();
    assert!(matches!(err, PageServiceError::PageNotFound(id) if id == child.page_id));
}

#[test]
fn delete_rejects_section_home() {
    let conn = setup();
    let (default, _) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());

    let err = service.delete(default.section_id).unwrap_err();
    assert!(matches!(
        err,
        PageServiceError::CannotDeleteSectionHome(id) if id == default.section_id
    ));
}

#[test]
fn register_relation_links_hand_made_translation() {
    let conn = setup();
    let (default, second) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);
    let second_home = home(&service, &second);

    let english = create_page(&service, &default_home, "Contact");
    let german = create_page(&service, &second_home, "Kontakt");
    assert_ne!(
        service.relation_id(english.page_id).unwrap(),
        service.relation_id(german.page_id).unwrap()
    );

    let relation_id = service
        .register_relation(german.page_id, english.page_id)
        .unwrap();
    assert_eq!(service.relation_id(german.page_id).unwrap(), Some(relation_id));
    assert_eq!(
        service
            .translated_page(english.page_id, second.section_id)
            .unwrap()
            .map(|page| page.page_id),
        Some(german.page_id)
    );
}

#[test]
fn register_relation_rejects_second_member_in_section() {
    let conn = setup();
    let (default, _) = seed_sections(&conn);
    let service = PageService::new(SqlitePageRepository::try_new(&conn).unwrap());
    let default_home = home(&service, &default);

    let first = create_page(&service, &default_home, "First");
    let second = create_page(&service, &default_home, "Second");

    let err = service
        .register_relation(second.page_id, first.page_id)
        .unwrap_err();
    assert!(matches!(
        err,
        PageServiceError::RelationConflict { section_id, .. } if section_id == default.section_id
    ));

    let alias_id = service.create_alias(first.page_id, second.page_id).unwrap();
    let err = service.register_relation(alias_id, first.page_id).unwrap_err();
    assert!(matches!(err, PageServiceError::AliasNotRelatable(id) if id == alias_id));
}
