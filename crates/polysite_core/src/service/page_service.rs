//! Page tree and relation tracking use-case service.
//!
//! # Responsibility
//! - Create pages and aliases inside sections.
//! - Duplicate pages and aliases while propagating relation ids.
//! - Answer relation and translation queries.
//!
//! # Invariants
//! - A copy inside the source's own section gets a fresh relation id.
//! - A copy into another section keeps the source relation id, unless that
//!   section already holds a member of the relation.
//! - An alias copy points at the original's copy in the target section; its
//!   `collection_id()` equals that copy's id.
//! - A page cannot be duplicated into itself or its own subtree.

use crate::model::page::{
    handle_from_name, validate_handle, HandleError, Page, PageId, RelationId,
};
use crate::repo::page_repo::{Duplication, NewPage, PageRepoError, PageRepository, RelationMember};
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from page service operations.
#[derive(Debug)]
pub enum PageServiceError {
    /// Page name is blank after trim.
    InvalidName,
    /// Handle is not a valid URL segment.
    InvalidHandle(HandleError),
    /// Target page does not exist.
    PageNotFound(PageId),
    /// Parent page does not exist.
    ParentNotFound(PageId),
    /// Parent is an alias and cannot hold children.
    ParentIsAlias(PageId),
    /// Page is not inside any section.
    NotInSection(PageId),
    /// Duplication target is the page itself or one of its descendants.
    InvalidTarget {
        page_id: PageId,
        target_parent_id: PageId,
    },
    /// Alias original has not been duplicated into the target section yet.
    MissingOriginal {
        alias_id: PageId,
        original_id: PageId,
        section_id: PageId,
    },
    /// Aliases share their original's relation and cannot join another one.
    AliasNotRelatable(PageId),
    /// Target section already holds a member of the relation.
    RelationConflict {
        relation_id: RelationId,
        section_id: PageId,
    },
    /// Section home pages are removed with their section, not one by one.
    CannotDeleteSectionHome(PageId),
    /// Repository-level failure.
    Repo(PageRepoError),
}

impl Display for PageServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "page name must not be blank"),
            Self::InvalidHandle(err) => write!(f, "{err}"),
            Self::PageNotFound(id) => write!(f, "page not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent page not found: {id}"),
            Self::ParentIsAlias(id) => write!(f, "parent page is an alias: {id}"),
            Self::NotInSection(id) => write!(f, "page is not inside a section: {id}"),
            Self::InvalidTarget {
                page_id,
                target_parent_id,
            } => write!(
                f,
                "cannot duplicate page {page_id} into itself or its subtree ({target_parent_id})"
            ),
            Self::MissingOriginal {
                alias_id,
                original_id,
                section_id,
            } => write!(
                f,
                "cannot duplicate alias {alias_id}: original {original_id} has no copy in section {section_id}"
            ),
            Self::AliasNotRelatable(id) => {
                write!(f, "alias {id} follows its original's relation")
            }
            Self::RelationConflict {
                relation_id,
                section_id,
            } => write!(
                f,
                "section {section_id} already has a page in relation {relation_id}"
            ),
            Self::CannotDeleteSectionHome(id) => {
                write!(f, "section home page cannot be deleted: {id}")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PageServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidHandle(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PageRepoError> for PageServiceError {
    fn from(value: PageRepoError) -> Self {
        match value {
            PageRepoError::PageNotFound(id) => Self::PageNotFound(id),
            PageRepoError::NotInSection(id) => Self::NotInSection(id),
            PageRepoError::MissingOriginal {
                alias_id,
                original_id,
                section_id,
            } => Self::MissingOriginal {
                alias_id,
                original_id,
                section_id,
            },
            PageRepoError::RelationConflict {
                relation_id,
                section_id,
            } => Self::RelationConflict {
                relation_id,
                section_id,
            },
            other => Self::Repo(other),
        }
    }
}

/// Request model for creating a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePageRequest {
    pub parent_id: PageId,
    pub name: String,
    /// Derived from `name` when absent.
    pub handle: Option<String>,
    pub template: Option<String>,
}

impl CreatePageRequest {
    pub fn new(parent_id: PageId, name: impl Into<String>) -> Self {
        Self {
            parent_id,
            name: name.into(),
            handle: None,
            template: None,
        }
    }
}

/// Page tree and relation tracker facade.
pub struct PageService<R: PageRepository> {
    repo: R,
}

impl<R: PageRepository> PageService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a page under a parent and registers it under a fresh relation.
    pub fn create_page(&self, request: CreatePageRequest) -> Result<Page, PageServiceError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(PageServiceError::InvalidName);
        }
        let handle = match request.handle {
            Some(handle) => {
                let handle = handle.trim().to_string();
                validate_handle(&handle).map_err(PageServiceError::InvalidHandle)?;
                handle
            }
            None => handle_from_name(&name).map_err(PageServiceError::InvalidHandle)?,
        };
        self.ensure_parent_accepts_children(request.parent_id)?;

        let page = self.repo.create_page(&NewPage {
            parent_id: request.parent_id,
            name,
            handle,
            template: request.template,
        })?;
        info!(
            "event=page_create module=page_service status=ok page={} parent={}",
            page.page_id, request.parent_id
        );
        Ok(page)
    }

    /// Creates an alias of `original_id` under `parent_id` and returns the alias id.
    ///
    /// Aliases of aliases point straight at the final original.
    pub fn create_alias(
        &self,
        original_id: PageId,
        parent_id: PageId,
    ) -> Result<PageId, PageServiceError> {
        self.require_page(original_id)?;
        self.ensure_parent_accepts_children(parent_id)?;

        let alias = self.repo.create_alias(original_id, parent_id)?;
        info!(
            "event=alias_create module=page_service status=ok alias={} original={} parent={}",
            alias.page_id,
            alias.collection_id(),
            parent_id
        );
        Ok(alias.page_id)
    }

    /// Loads one page or alias node.
    pub fn get_page(&self, page_id: PageId) -> Result<Option<Page>, PageServiceError> {
        self.repo.get_page(page_id).map_err(Into::into)
    }

    /// Lists direct children of a page.
    pub fn list_children(&self, parent_id: PageId) -> Result<Vec<Page>, PageServiceError> {
        self.repo
            .get_page(parent_id)?
            .ok_or(PageServiceError::ParentNotFound(parent_id))?;
        self.repo.list_children(parent_id).map_err(Into::into)
    }

    /// Relation id of a page; `None` for unknown or unregistered pages.
    pub fn relation_id(&self, page_id: PageId) -> Result<Option<RelationId>, PageServiceError> {
        self.repo.relation_id(page_id).map_err(Into::into)
    }

    /// Duplicates a page or alias under `target_parent_id`.
    ///
    /// The target section is the section containing `target_parent_id`.
    /// Page row and relation linkage are written in one transaction.
    pub fn duplicate(
        &self,
        page_id: PageId,
        target_parent_id: PageId,
    ) -> Result<Duplication, PageServiceError> {
        let started_at = Instant::now();
        self.require_page(page_id)?;
        self.ensure_parent_accepts_children(target_parent_id)?;
        if self.is_same_or_descendant(target_parent_id, page_id)? {
            return Err(PageServiceError::InvalidTarget {
                page_id,
                target_parent_id,
            });
        }

        let source_relation = self.repo.relation_id(page_id)?;
        match self.repo.duplicate_page(page_id, target_parent_id) {
            Ok(duplication) => {
                let relation_mode = if source_relation == Some(duplication.relation_id) {
                    "shared"
                } else {
                    "fresh"
                };
                info!(
                    "event=page_duplicate module=page_service status=ok source={} copy={} target_parent={} alias={} relation_mode={} duration_ms={}",
                    page_id,
                    duplication.page.page_id,
                    target_parent_id,
                    duplication.page.is_alias(),
                    relation_mode,
                    started_at.elapsed().as_millis()
                );
                Ok(duplication)
            }
            Err(err @ PageRepoError::MissingOriginal { .. }) => {
                warn!(
                    "event=page_duplicate module=page_service status=rejected source={} target_parent={} error_code=missing_original",
                    page_id, target_parent_id
                );
                Err(err.into())
            }
            Err(err) => {
                error!(
                    "event=page_duplicate module=page_service status=error source={} target_parent={} duration_ms={} error={}",
                    page_id,
                    target_parent_id,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Member of the page's relation inside `section_id`.
    pub fn translated_page(
        &self,
        page_id: PageId,
        section_id: PageId,
    ) -> Result<Option<Page>, PageServiceError> {
        match self.repo.relation_id(page_id)? {
            Some(relation_id) => self
                .repo
                .member_in_section(relation_id, section_id)
                .map_err(Into::into),
            None => Ok(None),
        }
    }

    /// All pages sharing a relation, ordered by section insertion order.
    pub fn relation_members(
        &self,
        relation_id: RelationId,
    ) -> Result<Vec<RelationMember>, PageServiceError> {
        self.repo.relation_members(relation_id).map_err(Into::into)
    }

    /// Moves `page_id` into the relation of `related_to_id`.
    ///
    /// Used to link pages that were translated by hand instead of duplicated.
    pub fn register_relation(
        &self,
        page_id: PageId,
        related_to_id: PageId,
    ) -> Result<RelationId, PageServiceError> {
        let page = self.require_page(page_id)?;
        if page.is_alias() {
            return Err(PageServiceError::AliasNotRelatable(page_id));
        }
        self.require_page(related_to_id)?;
        let relation_id = self
            .repo
            .relation_id(related_to_id)?
            .ok_or(PageServiceError::NotInSection(related_to_id))?;

        self.repo.assign_relation(page_id, relation_id)?;
        info!(
            "event=relation_register module=page_service status=ok page={page_id} relation={relation_id}"
        );
        Ok(relation_id)
    }

    /// Deletes a page with its subtree and the aliases pointing into it.
    ///
    /// Other members of the page's relation are left untouched.
    pub fn delete(&self, page_id: PageId) -> Result<(), PageServiceError> {
        let page = self.require_page(page_id)?;
        if page.is_root() {
            return Err(PageServiceError::CannotDeleteSectionHome(page_id));
        }
        self.repo.delete_page(page_id)?;
        info!("event=page_delete module=page_service status=ok page={page_id}");
        Ok(())
    }

    fn require_page(&self, page_id: PageId) -> Result<Page, PageServiceError> {
        self.repo
            .get_page(page_id)?
            .ok_or(PageServiceError::PageNotFound(page_id))
    }

    fn ensure_parent_accepts_children(&self, parent_id: PageId) -> Result<(), PageServiceError> {
        let parent = self
            .repo
            .get_page(parent_id)?
            .ok_or(PageServiceError::ParentNotFound(parent_id))?;
        if parent.is_alias() {
            return Err(PageServiceError::ParentIsAlias(parent_id));
        }
        if self.repo.section_id_for_page(parent_id)?.is_none() {
            return Err(PageServiceError::NotInSection(parent_id));
        }
        Ok(())
    }

    fn is_same_or_descendant(
        &self,
        candidate: PageId,
        ancestor: PageId,
    ) -> Result<bool, PageServiceError> {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate);
        while let Some(current) = cursor {
            if current == ancestor {
                return Ok(true);
            }
            if !visited.insert(current) {
                return Ok(true);
            }
            cursor = self.repo.get_page(current)?.and_then(|page| page.parent_id);
        }
        Ok(false)
    }
}
