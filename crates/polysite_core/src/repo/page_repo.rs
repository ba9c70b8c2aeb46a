//! Page tree and relation repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist pages, aliases and their cross-locale relation rows.
//! - Run duplication as one atomic unit: new page row plus relation linkage.
//!
//! # Invariants
//! - Every non-alias page inside a section owns exactly one `page_relations` row.
//! - Aliases never own a relation row; their relation is the original's.
//! - A relation has at most one member per section.
//! - Child listing is deterministic: `display_order ASC, page_uuid ASC`.

use crate::db::DbError;
use crate::model::page::{new_relation_id, Page, PageId, RelationId};
use crate::repo::schema::{
    check_schema, next_display_order, parse_uuid, section_uuid_for_page, unique_sibling_handle,
    SchemaIssue,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PAGE_SELECT_SQL: &str = "SELECT
    page_uuid,
    parent_uuid,
    pointer_uuid,
    name,
    handle,
    template,
    display_order,
    created_at,
    updated_at
FROM pages";

const PAGE_COLUMNS: &[&str] = &[
    "page_uuid",
    "parent_uuid",
    "pointer_uuid",
    "name",
    "handle",
    "template",
    "display_order",
    "created_at",
    "updated_at",
];
const RELATION_COLUMNS: &[&str] = &["page_uuid", "relation_uuid", "section_uuid"];

/// Result type used by page repository operations.
pub type PageRepoResult<T> = Result<T, PageRepoError>;

/// Errors from page repository operations.
#[derive(Debug)]
pub enum PageRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target page does not exist.
    PageNotFound(PageId),
    /// Page is not below any section home.
    NotInSection(PageId),
    /// Alias duplication target section has no copy of the alias original yet.
    MissingOriginal {
        alias_id: PageId,
        original_id: PageId,
        section_id: PageId,
    },
    /// Section already holds another member of the relation.
    RelationConflict {
        relation_id: RelationId,
        section_id: PageId,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for PageRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::PageNotFound(id) => write!(f, "page not found: {id}"),
            Self::NotInSection(id) => write!(f, "page is not inside a section: {id}"),
            Self::MissingOriginal {
                alias_id,
                original_id,
                section_id,
            } => write!(
                f,
                "cannot duplicate alias {alias_id}: original {original_id} has no copy in section {section_id}"
            ),
            Self::RelationConflict {
                relation_id,
                section_id,
            } => write!(
                f,
                "section {section_id} already has a page in relation {relation_id}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "page repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "page repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "page repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid page data: {message}"),
        }
    }
}

impl Error for PageRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for PageRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PageRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SchemaIssue> for PageRepoError {
    fn from(value: SchemaIssue) -> Self {
        match value {
            SchemaIssue::Version { expected, actual } => Self::UninitializedConnection {
                expected_version: expected,
                actual_version: actual,
            },
            SchemaIssue::MissingTable(table) => Self::MissingRequiredTable(table),
            SchemaIssue::MissingColumn { table, column } => {
                Self::MissingRequiredColumn { table, column }
            }
        }
    }
}

/// Input for creating one regular page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub parent_id: PageId,
    /// Already trimmed and non-blank.
    pub name: String,
    /// Preferred handle; a numeric suffix is added on sibling collision.
    pub handle: String,
    pub template: Option<String>,
}

/// Outcome of a duplication: the new node and the relation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplication {
    pub page: Page,
    pub relation_id: RelationId,
}

/// One page of a relation together with the section holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMember {
    pub section_id: PageId,
    pub page: Page,
}

/// Repository interface for page tree and relation operations.
pub trait PageRepository {
    /// Creates one page and registers it under a fresh relation.
    fn create_page(&self, new_page: &NewPage) -> PageRepoResult<Page>;
    /// Creates an alias of `original_id` under `parent_id`.
    fn create_alias(&self, original_id: PageId, parent_id: PageId) -> PageRepoResult<Page>;
    /// Loads one page (or alias node) by id.
    fn get_page(&self, page_id: PageId) -> PageRepoResult<Option<Page>>;
    /// Lists direct children of a page.
    fn list_children(&self, parent_id: PageId) -> PageRepoResult<Vec<Page>>;
    /// Resolves the section containing a page.
    fn section_id_for_page(&self, page_id: PageId) -> PageRepoResult<Option<PageId>>;
    /// Relation of a page; aliases report their original's relation.
    fn relation_id(&self, page_id: PageId) -> PageRepoResult<Option<RelationId>>;
    /// Member of a relation inside one section.
    fn member_in_section(
        &self,
        relation_id: RelationId,
        section_id: PageId,
    ) -> PageRepoResult<Option<Page>>;
    /// All members of a relation, ordered by section position.
    fn relation_members(&self, relation_id: RelationId) -> PageRepoResult<Vec<RelationMember>>;
    /// Copies a page (or alias) under `target_parent_id` atomically.
    fn duplicate_page(
        &self,
        source_id: PageId,
        target_parent_id: PageId,
    ) -> PageRepoResult<Duplication>;
    /// Moves a page into an existing relation.
    fn assign_relation(&self, page_id: PageId, relation_id: RelationId) -> PageRepoResult<()>;
    /// Deletes a page, its subtree and aliases pointing into it.
    fn delete_page(&self, page_id: PageId) -> PageRepoResult<()>;
}

/// SQLite-backed page repository.
pub struct SqlitePageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePageRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> PageRepoResult<Self> {
        ensure_page_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PageRepository for SqlitePageRepository<'_> {
    fn create_page(&self, new_page: &NewPage) -> PageRepoResult<Page> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        load_required_page(&tx, new_page.parent_id)?;
        let section_id = required_section_id(&tx, new_page.parent_id)?;

        let page_uuid = Uuid::new_v4();
        insert_page_row(
            &tx,
            page_uuid,
            new_page.parent_id,
            None,
            &new_page.name,
            &new_page.handle,
            new_page.template.as_deref(),
        )?;
        insert_relation_row(&tx, page_uuid, new_relation_id(), section_id)?;

        let page = load_required_page(&tx, page_uuid)?;
        tx.commit()?;
        Ok(page)
    }

    fn create_alias(&self, original_id: PageId, parent_id: PageId) -> PageRepoResult<Page> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let original = load_required_page(&tx, original_id)?;
        let target = match original.pointer_id {
            Some(pointer_id) => load_required_page(&tx, pointer_id)?,
            None => original,
        };
        load_required_page(&tx, parent_id)?;
        required_section_id(&tx, parent_id)?;

        let alias_uuid = Uuid::new_v4();
        insert_page_row(
            &tx,
            alias_uuid,
            parent_id,
            Some(target.page_id),
            &target.name,
            &target.handle,
            None,
        )?;

        let alias = load_required_page(&tx, alias_uuid)?;
        tx.commit()?;
        Ok(alias)
    }

    fn get_page(&self, page_id: PageId) -> PageRepoResult<Option<Page>> {
        load_page(self.conn, page_id)
    }

    fn list_children(&self, parent_id: PageId) -> PageRepoResult<Vec<Page>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PAGE_SELECT_SQL}
             WHERE parent_uuid = ?1
             ORDER BY display_order ASC, page_uuid ASC;"
        ))?;
        let mut rows = stmt.query([parent_id.to_string()])?;
        let mut pages = Vec::new();
        while let Some(row) = rows.next()? {
            pages.push(parse_page_row(row)?);
        }
        Ok(pages)
    }

    fn section_id_for_page(&self, page_id: PageId) -> PageRepoResult<Option<PageId>> {
        section_id_for(self.conn, page_id)
    }

    fn relation_id(&self, page_id: PageId) -> PageRepoResult<Option<RelationId>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT r.relation_uuid
                 FROM pages p
                 INNER JOIN page_relations r
                    ON r.page_uuid = COALESCE(p.pointer_uuid, p.page_uuid)
                 WHERE p.page_uuid = ?1;",
                [page_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|value| {
                parse_uuid(&value, "page_relations.relation_uuid")
                    .map_err(PageRepoError::InvalidData)
            })
            .transpose()
    }

    fn member_in_section(
        &self,
        relation_id: RelationId,
        section_id: PageId,
    ) -> PageRepoResult<Option<Page>> {
        member_in_section(self.conn, relation_id, section_id)
    }

    fn relation_members(&self, relation_id: RelationId) -> PageRepoResult<Vec<RelationMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                r.section_uuid AS section_uuid,
                p.page_uuid AS page_uuid,
                p.parent_uuid AS parent_uuid,
                p.pointer_uuid AS pointer_uuid,
                p.name AS name,
                p.handle AS handle,
                p.template AS template,
                p.display_order AS display_order,
                p.created_at AS created_at,
                p.updated_at AS updated_at
             FROM page_relations r
             INNER JOIN pages p ON p.page_uuid = r.page_uuid
             INNER JOIN sections s ON s.section_uuid = r.section_uuid
             WHERE r.relation_uuid = ?1
             ORDER BY s.position ASC;",
        )?;
        let mut rows = stmt.query([relation_id.to_string()])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            let section_uuid_text: String = row.get("section_uuid")?;
            members.push(RelationMember {
                section_id: parse_uuid(&section_uuid_text, "page_relations.section_uuid")
                    .map_err(PageRepoError::InvalidData)?,
                page: parse_page_row(row)?,
            });
        }
        Ok(members)
    }

    fn duplicate_page(
        &self,
        source_id: PageId,
        target_parent_id: PageId,
    ) -> PageRepoResult<Duplication> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let source = load_required_page(&tx, source_id)?;
        load_required_page(&tx, target_parent_id)?;
        let target_section_id = required_section_id(&tx, target_parent_id)?;

        let duplication = match source.pointer_id {
            Some(original_id) => duplicate_alias(
                &tx,
                &source,
                original_id,
                target_parent_id,
                target_section_id,
            )?,
            None => duplicate_regular(&tx, &source, target_parent_id, target_section_id)?,
        };

        tx.commit()?;
        Ok(duplication)
    }

    fn assign_relation(&self, page_id: PageId, relation_id: RelationId) -> PageRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        load_required_page(&tx, page_id)?;
        let section_id = required_section_id(&tx, page_id)?;

        if let Some(existing) = member_in_section(&tx, relation_id, section_id)? {
            if existing.page_id != page_id {
                return Err(PageRepoError::RelationConflict {
                    relation_id,
                    section_id,
                });
            }
            return Ok(());
        }

        tx.execute(
            "INSERT INTO page_relations (page_uuid, relation_uuid, section_uuid)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(page_uuid) DO UPDATE SET
                relation_uuid = excluded.relation_uuid,
                section_uuid = excluded.section_uuid;",
            params![
                page_id.to_string(),
                relation_id.to_string(),
                section_id.to_string(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_page(&self, page_id: PageId) -> PageRepoResult<()> {
        // Subtree, aliases and relation rows go through ON DELETE CASCADE.
        let changed = self.conn.execute(
            "DELETE FROM pages WHERE page_uuid = ?1;",
            [page_id.to_string()],
        )?;
        if changed == 0 {
            return Err(PageRepoError::PageNotFound(page_id));
        }
        Ok(())
    }
}

fn duplicate_regular(
    conn: &Connection,
    source: &Page,
    target_parent_id: PageId,
    target_section_id: PageId,
) -> PageRepoResult<Duplication> {
    let source_relation = relation_row(conn, source.page_id)?;
    let relation_id = match source_relation {
        Some(relation_id) => {
            if member_in_section(conn, relation_id, target_section_id)?.is_some() {
                new_relation_id()
            } else {
                relation_id
            }
        }
        None => new_relation_id(),
    };

    let page_uuid = Uuid::new_v4();
    insert_page_row(
        conn,
        page_uuid,
        target_parent_id,
        None,
        &source.name,
        &source.handle,
        source.template.as_deref(),
    )?;
    insert_relation_row(conn, page_uuid, relation_id, target_section_id)?;

    Ok(Duplication {
        page: load_required_page(conn, page_uuid)?,
        relation_id,
    })
}

fn duplicate_alias(
    conn: &Connection,
    alias: &Page,
    original_id: PageId,
    target_parent_id: PageId,
    target_section_id: PageId,
) -> PageRepoResult<Duplication> {
    let missing_original = || PageRepoError::MissingOriginal {
        alias_id: alias.page_id,
        original_id,
        section_id: target_section_id,
    };

    let relation_id = relation_row(conn, original_id)?
        .ok_or_else(missing_original)?;
    let translated = member_in_section(conn, relation_id, target_section_id)?
        .ok_or_else(missing_original)?;

    let alias_uuid = Uuid::new_v4();
    insert_page_row(
        conn,
        alias_uuid,
        target_parent_id,
        Some(translated.page_id),
        &translated.name,
        &translated.handle,
        None,
    )?;

    Ok(Duplication {
        page: load_required_page(conn, alias_uuid)?,
        relation_id,
    })
}

fn insert_page_row(
    conn: &Connection,
    page_uuid: PageId,
    parent_uuid: PageId,
    pointer_uuid: Option<PageId>,
    name: &str,
    handle: &str,
    template: Option<&str>,
) -> PageRepoResult<()> {
    let handle = unique_sibling_handle(conn, Some(parent_uuid), handle)?;
    let display_order = next_display_order(conn, Some(parent_uuid))?;
    conn.execute(
        "INSERT INTO pages (
            page_uuid,
            parent_uuid,
            pointer_uuid,
            name,
            handle,
            template,
            display_order
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            page_uuid.to_string(),
            parent_uuid.to_string(),
            pointer_uuid.map(|value| value.to_string()),
            name,
            handle,
            template,
            display_order,
        ],
    )?;
    Ok(())
}

fn insert_relation_row(
    conn: &Connection,
    page_uuid: PageId,
    relation_id: RelationId,
    section_id: PageId,
) -> PageRepoResult<()> {
    conn.execute(
        "INSERT INTO page_relations (page_uuid, relation_uuid, section_uuid)
         VALUES (?1, ?2, ?3);",
        params![
            page_uuid.to_string(),
            relation_id.to_string(),
            section_id.to_string(),
        ],
    )?;
    Ok(())
}

fn relation_row(conn: &Connection, page_id: PageId) -> PageRepoResult<Option<RelationId>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT relation_uuid FROM page_relations WHERE page_uuid = ?1;",
            [page_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|value| {
            parse_uuid(&value, "page_relations.relation_uuid").map_err(PageRepoError::InvalidData)
        })
        .transpose()
}

fn member_in_section(
    conn: &Connection,
    relation_id: RelationId,
    section_id: PageId,
) -> PageRepoResult<Option<Page>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT page_uuid
             FROM page_relations
             WHERE relation_uuid = ?1
               AND section_uuid = ?2;",
            [relation_id.to_string(), section_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match value {
        Some(value) => {
            let page_id = parse_uuid(&value, "page_relations.page_uuid")
                .map_err(PageRepoError::InvalidData)?;
            load_page(conn, page_id)
        }
        None => Ok(None),
    }
}

fn section_id_for(conn: &Connection, page_id: PageId) -> PageRepoResult<Option<PageId>> {
    section_uuid_for_page(conn, page_id)?
        .map(|value| {
            parse_uuid(&value, "sections.section_uuid").map_err(PageRepoError::InvalidData)
        })
        .transpose()
}

fn required_section_id(conn: &Connection, page_id: PageId) -> PageRepoResult<PageId> {
    section_id_for(conn, page_id)?.ok_or(PageRepoError::NotInSection(page_id))
}

fn load_page(conn: &Connection, page_id: PageId) -> PageRepoResult<Option<Page>> {
    let mut stmt = conn.prepare(&format!("{PAGE_SELECT_SQL} WHERE page_uuid = ?1;"))?;
    let mut rows = stmt.query([page_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_page_row(row)?));
    }
    Ok(None)
}

fn load_required_page(conn: &Connection, page_id: PageId) -> PageRepoResult<Page> {
    load_page(conn, page_id)?.ok_or(PageRepoError::PageNotFound(page_id))
}

fn parse_page_row(row: &Row<'_>) -> PageRepoResult<Page> {
    let page_uuid_text: String = row.get("page_uuid")?;
    let page_id =
        parse_uuid(&page_uuid_text, "pages.page_uuid").map_err(PageRepoError::InvalidData)?;

    let parent_id = row
        .get::<_, Option<String>>("parent_uuid")?
        .map(|value| parse_uuid(&value, "pages.parent_uuid"))
        .transpose()
        .map_err(PageRepoError::InvalidData)?;
    let pointer_id = row
        .get::<_, Option<String>>("pointer_uuid")?
        .map(|value| parse_uuid(&value, "pages.pointer_uuid"))
        .transpose()
        .map_err(PageRepoError::InvalidData)?;

    Ok(Page {
        page_id,
        parent_id,
        pointer_id,
        name: row.get("name")?,
        handle: row.get("handle")?,
        template: row.get("template")?,
        display_order: row.get("display_order")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ensure_page_connection_ready(conn: &Connection) -> PageRepoResult<()> {
    let issue = check_schema(
        conn,
        &[
            ("pages", PAGE_COLUMNS),
            ("page_relations", RELATION_COLUMNS),
        ],
    )?;
    match issue {
        Some(issue) => Err(issue.into()),
        None => Ok(()),
    }
}
