//! # Document Providers
//!
//! The document store (e.g. a cloud drive) is an external service. Distributions reach it
//! through the narrow [`DocumentProvider`] interface: copy a document, share a document, create a
//! folder, delete a document. Every call is a suspension point and may fail independently.
//!
//! ## Current Backends
//!
//! - [`LocalProvider`] - documents stored as directories on the local filesystem, with a JSON
//!   metadata sidecar recording names, folders and grants.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::{CreatedDocument, DocumentId, Permission, PermissionTemplate, Principal};

mod local;
#[cfg(test)]
pub(crate) mod mock;

pub use local::{DocumentKind, DocumentMeta, Grant, LocalProvider};

//================================================================================================
// Types
//================================================================================================

/// A failure reported by the document provider for a single call.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The document does not exist.
    #[error("document `{0}` not found")]
    NotFound(DocumentId),
    /// A folder was expected but the id points at a file.
    #[error("document `{0}` is not a folder")]
    NotAFolder(DocumentId),
    /// The provider refused the call because a quota is exhausted.
    #[error("quota exceeded: {0}")]
    Quota(String),
    /// The caller may not perform this operation.
    #[error("permission denied: {0}")]
    Permission(String),
    /// The provider could not be reached.
    #[error("network error: {0}")]
    Network(String),
    /// A path could not be expressed as a URL.
    #[error("cannot build a url for `{0}`")]
    InvalidPath(PathBuf),
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Document metadata could not be (de)serialized.
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// A request to copy a document for a set of grantees.
#[derive(Debug, Clone)]
pub struct CopyRequest {
    /// The document to copy.
    pub source: DocumentId,
    /// The folder the copy is placed in, if any.
    pub folder: Option<DocumentId>,
    /// The title of the copy.
    pub name: String,
    /// Who the copy is shared with.
    pub grantees: Vec<Principal>,
    /// The access the grantees receive.
    pub permission: Permission,
    /// Whether the source is a pre-existing external document.
    pub from_existing: bool,
}

/// The document provider, consumed as an external service.
#[async_trait]
pub trait DocumentProvider: Send + Sync + 'static {
    /// Creates a permissioned copy of a document.
    async fn copy(&self, request: CopyRequest) -> Result<CreatedDocument, ProviderError>;

    /// Grants access to an existing document and returns the url the grantees open.
    async fn share(
        &self,
        document: &DocumentId,
        grantees: &[Principal],
        permission: Permission,
    ) -> Result<Url, ProviderError>;

    /// Creates a folder that later copies can be placed in.
    async fn create_folder(
        &self,
        name: &str,
        grantees: &[Principal],
    ) -> Result<CreatedDocument, ProviderError>;

    /// Deletes a document and returns the provider's HTTP-style status code.
    async fn delete(&self, document: &DocumentId) -> Result<u16, ProviderError>;

    /// Maps an activity's permission template onto the provider's roles.
    fn resolve_permission(&self, template: PermissionTemplate) -> Permission {
        template.resolve()
    }
}
