//! Section registry use-case service.
//!
//! # Responsibility
//! - Resolve locales and languages to sections.
//! - Expose the single default section and multilingual detection.
//! - Validate section bootstrap input above the repository layer.
//!
//! # Invariants
//! - Lookups are pure reads; "not found" is `Ok(None)`, never an error.
//! - A missing default section is a configuration error surfaced as
//!   `MissingDefaultSection`.

use crate::model::locale::{Locale, LocaleParseError};
use crate::model::page::{validate_handle, HandleError, PageId};
use crate::model::section::Section;
use crate::repo::section_repo::{NewSection, SectionRepoError, SectionRepository};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Sections needed before a site counts as multilingual.
const MULTILINGUAL_MIN_SECTIONS: usize = 2;

/// Errors from section service operations.
#[derive(Debug)]
pub enum SectionServiceError {
    /// Locale string is not `language[_REGION]`.
    InvalidLocale(LocaleParseError),
    /// Home page name is blank after trim.
    InvalidHomeName,
    /// Home page handle is not a valid URL segment.
    InvalidHandle(HandleError),
    /// A section for this locale already exists.
    LocaleAlreadyRegistered(Locale),
    /// Another section home already uses this handle.
    HomeHandleTaken(String),
    /// Target section does not exist.
    SectionNotFound(PageId),
    /// No section is flagged default.
    MissingDefaultSection,
    /// Repository-level failure.
    Repo(SectionRepoError),
}

impl Display for SectionServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLocale(err) => write!(f, "{err}"),
            Self::InvalidHomeName => write!(f, "section home name must not be blank"),
            Self::InvalidHandle(err) => write!(f, "{err}"),
            Self::LocaleAlreadyRegistered(locale) => {
                write!(f, "a section for locale `{locale}` already exists")
            }
            Self::HomeHandleTaken(handle) => {
                write!(f, "section home handle `{handle}` is already in use")
            }
            Self::SectionNotFound(id) => write!(f, "section not found: {id}"),
            Self::MissingDefaultSection => write!(f, "no default section is configured"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SectionServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidLocale(err) => Some(err),
            Self::InvalidHandle(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SectionRepoError> for SectionServiceError {
    fn from(value: SectionRepoError) -> Self {
        match value {
            SectionRepoError::SectionNotFound(id) => Self::SectionNotFound(id),
            SectionRepoError::LocaleAlreadyRegistered(locale) => {
                Self::LocaleAlreadyRegistered(locale)
            }
            SectionRepoError::HomeHandleTaken(handle) => Self::HomeHandleTaken(handle),
            other => Self::Repo(other),
        }
    }
}

impl From<LocaleParseError> for SectionServiceError {
    fn from(value: LocaleParseError) -> Self {
        Self::InvalidLocale(value)
    }
}

/// Request model for registering a locale section with its home page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSectionRequest {
    pub locale: Locale,
    /// Home page name, e.g. `Second language`.
    pub home_name: String,
    /// Home page handle, e.g. `chde`.
    pub home_handle: String,
    /// Page template handle for the home page.
    pub template: Option<String>,
    /// Make this the default section.
    pub make_default: bool,
}

impl AddSectionRequest {
    pub fn new(
        locale: Locale,
        home_name: impl Into<String>,
        home_handle: impl Into<String>,
    ) -> Self {
        Self {
            locale,
            home_name: home_name.into(),
            home_handle: home_handle.into(),
            template: None,
            make_default: false,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn as_default(mut self) -> Self {
        self.make_default = true;
        self
    }
}

/// Section registry facade.
pub struct SectionService<R: SectionRepository> {
    repo: R,
}

impl<R: SectionRepository> SectionService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a locale section and creates its home page.
    ///
    /// The first section registered becomes the default.
    pub fn add_section(&self, request: AddSectionRequest) -> Result<Section, SectionServiceError> {
        let started_at = Instant::now();
        let home_name = request.home_name.trim().to_string();
        if home_name.is_empty() {
            return Err(SectionServiceError::InvalidHomeName);
        }
        let home_handle = request.home_handle.trim().to_string();
        validate_handle(&home_handle).map_err(SectionServiceError::InvalidHandle)?;

        let new_section = NewSection {
            locale: request.locale,
            home_name,
            home_handle,
            template: request.template,
            make_default: request.make_default,
        };
        match self.repo.create_section(&new_section) {
            Ok(section) => {
                info!(
                    "event=section_add module=section_service status=ok locale={} is_default={} duration_ms={}",
                    section.locale,
                    section.is_default,
                    started_at.elapsed().as_millis()
                );
                Ok(section)
            }
            Err(err) => {
                error!(
                    "event=section_add module=section_service status=error locale={} duration_ms={} error={}",
                    new_section.locale,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Exact lookup by locale.
    pub fn get_by_locale(&self, locale: &Locale) -> Result<Option<Section>, SectionServiceError> {
        self.repo.find_by_locale(locale).map_err(Into::into)
    }

    /// Exact lookup by locale string such as `de_CH`.
    ///
    /// Malformed input is `InvalidLocale`; a well-formed unknown locale is `None`.
    pub fn get_by_locale_code(&self, code: &str) -> Result<Option<Section>, SectionServiceError> {
        let locale = Locale::parse(code)?;
        self.get_by_locale(&locale)
    }

    /// First section in insertion order whose language matches.
    pub fn get_by_language(&self, language: &str) -> Result<Option<Section>, SectionServiceError> {
        let language = language.trim();
        if language.is_empty() {
            return Ok(None);
        }
        self.repo.find_by_language(language).map_err(Into::into)
    }

    /// Returns the default section.
    ///
    /// # Errors
    /// - `MissingDefaultSection` when no section has been registered.
    pub fn default_section(&self) -> Result<Section, SectionServiceError> {
        match self.repo.find_default()? {
            Some(section) => Ok(section),
            None => {
                error!(
                    "event=section_default module=section_service status=error error_code=missing_default_section"
                );
                Err(SectionServiceError::MissingDefaultSection)
            }
        }
    }

    /// Moves the default flag to another section.
    pub fn set_default_section(&self, section_id: PageId) -> Result<(), SectionServiceError> {
        self.repo.set_default(section_id)?;
        info!(
            "event=section_set_default module=section_service status=ok section={section_id}"
        );
        Ok(())
    }

    /// Loads one section by its home page id.
    pub fn get_by_id(&self, section_id: PageId) -> Result<Option<Section>, SectionServiceError> {
        self.repo.get_section(section_id).map_err(Into::into)
    }

    /// All sections in insertion order.
    pub fn list_sections(&self) -> Result<Vec<Section>, SectionServiceError> {
        self.repo.list_sections().map_err(Into::into)
    }

    /// Section containing a page, or `None` for unknown pages.
    pub fn section_of_page(&self, page_id: PageId) -> Result<Option<Section>, SectionServiceError> {
        match self.repo.section_id_for_page(page_id)? {
            Some(section_id) => self.get_by_id(section_id),
            None => Ok(None),
        }
    }

    /// Whether more than one locale section is registered.
    pub fn is_multilingual_enabled(&self) -> Result<bool, SectionServiceError> {
        Ok(self.repo.list_sections()?.len() >= MULTILINGUAL_MIN_SECTIONS)
    }
}
