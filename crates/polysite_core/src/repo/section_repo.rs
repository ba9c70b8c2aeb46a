//! Section repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist locale sections together with their home pages.
//! - Answer locale, language and default-section lookups.
//!
//! # Invariants
//! - `sections.locale` is unique; lookups by locale are exact matches.
//! - At most one row has `is_default = 1` (enforced by a partial unique index).
//! - Language lookup resolves ties by insertion order (`position ASC`).

use crate::db::DbError;
use crate::model::locale::Locale;
use crate::model::page::{new_relation_id, PageId};
use crate::model::section::Section;
use crate::repo::schema::{
    check_schema, next_display_order, parse_uuid, section_uuid_for_page, sibling_handle_taken,
    SchemaIssue,
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const SECTION_SELECT_SQL: &str = "SELECT
    s.section_uuid AS section_uuid,
    s.language AS language,
    s.region AS region,
    s.locale AS locale,
    s.is_default AS is_default,
    s.position AS position,
    p.name AS home_name,
    p.handle AS home_handle
FROM sections s
INNER JOIN pages p ON p.page_uuid = s.section_uuid";

const SECTION_COLUMNS: &[&str] = &[
    "section_uuid",
    "language",
    "region",
    "locale",
    "is_default",
    "position",
];
const HOME_PAGE_COLUMNS: &[&str] = &["page_uuid", "parent_uuid", "name", "handle"];
const RELATION_COLUMNS: &[&str] = &["page_uuid", "relation_uuid", "section_uuid"];

/// Result type used by section repository operations.
pub type SectionRepoResult<T> = Result<T, SectionRepoError>;

/// Errors from section repository operations.
#[derive(Debug)]
pub enum SectionRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target section does not exist.
    SectionNotFound(PageId),
    /// Another section already serves this locale.
    LocaleAlreadyRegistered(Locale),
    /// Another section home already uses this handle.
    HomeHandleTaken(String),
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

impl Display for SectionRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::SectionNotFound(id) => write!(f, "section not found: {id}"),
            Self::LocaleAlreadyRegistered(locale) => {
                write!(f, "a section for locale `{locale}` already exists")
            }
            Self::HomeHandleTaken(handle) => {
                write!(f, "section home handle `{handle}` is already in use")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "section repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "section repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "section repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid section data: {message}"),
        }
    }
}

impl Error for SectionRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for SectionRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SectionRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<SchemaIssue> for SectionRepoError {
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

/// Input for creating one section and its home page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSection {
    pub locale: Locale,
    /// Home page name, already trimmed and non-blank.
    pub home_name: String,
    /// Home page handle, already validated.
    pub home_handle: String,
    pub template: Option<String>,
    /// Take over the default flag. Ignored (treated as `true`) for the first section.
    pub make_default: bool,
}

/// Repository interface for section operations.
pub trait SectionRepository {
    /// Creates home page, section row and the home page relation atomically.
    fn create_section(&self, new_section: &NewSection) -> SectionRepoResult<Section>;
    /// Loads one section by home page id.
    fn get_section(&self, section_id: PageId) -> SectionRepoResult<Option<Section>>;
    /// Exact match on canonical locale key.
    fn find_by_locale(&self, locale: &Locale) -> SectionRepoResult<Option<Section>>;
    /// First section (insertion order) whose language matches.
    fn find_by_language(&self, language: &str) -> SectionRepoResult<Option<Section>>;
    /// The section flagged default, if configured.
    fn find_default(&self) -> SectionRepoResult<Option<Section>>;
    /// All sections in insertion order.
    fn list_sections(&self) -> SectionRepoResult<Vec<Section>>;
    /// Moves the default flag to one section.
    fn set_default(&self, section_id: PageId) -> SectionRepoResult<()>;
    /// Resolves the section containing a page.
    fn section_id_for_page(&self, page_id: PageId) -> SectionRepoResult<Option<PageId>>;
}

/// SQLite-backed section repository.
pub struct SqliteSectionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSectionRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> SectionRepoResult<Self> {
        ensure_section_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SectionRepository for SqliteSectionRepository<'_> {
    fn create_section(&self, new_section: &NewSection) -> SectionRepoResult<Section> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let locale_key = new_section.locale.code();
        let locale_taken: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sections WHERE locale = ?1);",
            [locale_key.as_str()],
            |row| row.get(0),
        )?;
        if locale_taken == 1 {
            return Err(SectionRepoError::LocaleAlreadyRegistered(
                new_section.locale.clone(),
            ));
        }
        if sibling_handle_taken(&tx, None, &new_section.home_handle)? {
            return Err(SectionRepoError::HomeHandleTaken(
                new_section.home_handle.clone(),
            ));
        }

        let has_default: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sections WHERE is_default = 1);",
            [],
            |row| row.get(0),
        )?;
        let is_default = new_section.make_default || has_default == 0;
        if is_default && has_default == 1 {
            tx.execute(
                "UPDATE sections SET is_default = 0 WHERE is_default = 1;",
                [],
            )?;
        }

        let section_uuid = Uuid::new_v4();
        let position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM sections;",
            [],
            |row| row.get(0),
        )?;
        let display_order = next_display_order(&tx, None)?;

        tx.execute(
            "INSERT INTO pages (
                page_uuid,
                parent_uuid,
                pointer_uuid,
                name,
                handle,
                template,
                display_order
            ) VALUES (?1, NULL, NULL, ?2, ?3, ?4, ?5);",
            params![
                section_uuid.to_string(),
                new_section.home_name,
                new_section.home_handle,
                new_section.template,
                display_order,
            ],
        )?;
        tx.execute(
            "INSERT INTO sections (
                section_uuid,
                language,
                region,
                locale,
                is_default,
                position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                section_uuid.to_string(),
                new_section.locale.language(),
                new_section.locale.region(),
                locale_key,
                i64::from(is_default),
                position,
            ],
        )?;
        tx.execute(
            "INSERT INTO page_relations (page_uuid, relation_uuid, section_uuid)
             VALUES (?1, ?2, ?1);",
            params![section_uuid.to_string(), new_relation_id().to_string()],
        )?;

        let section = load_section(&tx, section_uuid)?
            .ok_or(SectionRepoError::SectionNotFound(section_uuid))?;
        tx.commit()?;
        Ok(section)
    }

    fn get_section(&self, section_id: PageId) -> SectionRepoResult<Option<Section>> {
        load_section(self.conn, section_id)
    }

    fn find_by_locale(&self, locale: &Locale) -> SectionRepoResult<Option<Section>> {
        query_one_section(
            self.conn,
            &format!("{SECTION_SELECT_SQL} WHERE s.locale = ?1;"),
            locale.code().as_str(),
        )
    }

    fn find_by_language(&self, language: &str) -> SectionRepoResult<Option<Section>> {
        query_one_section(
            self.conn,
            &format!(
                "{SECTION_SELECT_SQL}
                 WHERE s.language = ?1
                 ORDER BY s.position ASC
                 LIMIT 1;"
            ),
            language.trim().to_ascii_lowercase().as_str(),
        )
    }

    fn find_default(&self) -> SectionRepoResult<Option<Section>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SECTION_SELECT_SQL} WHERE s.is_default = 1 LIMIT 1;"
        ))?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_section_row(row)?));
        }
        Ok(None)
    }

    fn list_sections(&self) -> SectionRepoResult<Vec<Section>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SECTION_SELECT_SQL} ORDER BY s.position ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut sections = Vec::new();
        while let Some(row) = rows.next()? {
            sections.push(parse_section_row(row)?);
        }
        Ok(sections)
    }

    fn set_default(&self, section_id: PageId) -> SectionRepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM sections WHERE section_uuid = ?1);",
            [section_id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(SectionRepoError::SectionNotFound(section_id));
        }

        tx.execute(
            "UPDATE sections SET is_default = 0 WHERE is_default = 1 AND section_uuid <> ?1;",
            [section_id.to_string()],
        )?;
        tx.execute(
            "UPDATE sections SET is_default = 1 WHERE section_uuid = ?1;",
            [section_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn section_id_for_page(&self, page_id: PageId) -> SectionRepoResult<Option<PageId>> {
        section_uuid_for_page(self.conn, page_id)?
            .map(|value| {
                parse_uuid(&value, "sections.section_uuid").map_err(SectionRepoError::InvalidData)
            })
            .transpose()
    }
}

fn load_section(conn: &Connection, section_id: PageId) -> SectionRepoResult<Option<Section>> {
    query_one_section(
        conn,
        &format!("{SECTION_SELECT_SQL} WHERE s.section_uuid = ?1;"),
        section_id.to_string().as_str(),
    )
}

fn query_one_section(
    conn: &Connection,
    sql: &str,
    param: &str,
) -> SectionRepoResult<Option<Section>> {
    let mut stmt = conn.prepare(sql)?;
    let section = stmt
        .query_row([param], |row| Ok(parse_section_row(row)))
        .optional()?;
    section.transpose()
}

fn parse_section_row(row: &Row<'_>) -> SectionRepoResult<Section> {
    let section_uuid_text: String = row.get("section_uuid")?;
    let section_id = parse_uuid(&section_uuid_text, "sections.section_uuid")
        .map_err(SectionRepoError::InvalidData)?;

    let language: String = row.get("language")?;
    let region: Option<String> = row.get("region")?;
    let locale = Locale::new(&language, region.as_deref()).map_err(|err| {
        SectionRepoError::InvalidData(format!("{err} in sections.language/region"))
    })?;

    let stored_key: String = row.get("locale")?;
    if stored_key != locale.code() {
        return Err(SectionRepoError::InvalidData(format!(
            "sections.locale `{stored_key}` does not match language/region `{locale}`"
        )));
    }

    let is_default = match row.get::<_, i64>("is_default")? {
        0 => false,
        1 => true,
        other => {
            return Err(SectionRepoError::InvalidData(format!(
                "invalid is_default value `{other}` in sections.is_default"
            )));
        }
    };

    Ok(Section {
        section_id,
        locale,
        is_default,
        position: row.get("position")?,
        home_name: row.get("home_name")?,
        home_handle: row.get("home_handle")?,
    })
}

fn ensure_section_connection_ready(conn: &Connection) -> SectionRepoResult<()> {
    let issue = check_schema(
        conn,
        &[
            ("sections", SECTION_COLUMNS),
            ("pages", HOME_PAGE_COLUMNS),
            ("page_relations", RELATION_COLUMNS),
        ],
    )?;
    match issue {
        Some(issue) => Err(issue.into()),
        None => Ok(()),
    }
}
