//! Documents as the distribution sees them: the activity's source, and whatever the provider
//! hands back after a copy, share or folder creation.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::PermissionTemplate;

/// A provider-assigned document (or folder) identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

/// The document an activity distributes.
///
/// Created once per activity; only the activity's sharing flag changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// The provider id of the document.
    pub id: DocumentId,
    /// The title copies are named after.
    pub name: String,
    /// Who owns the document, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// The access recipients are granted.
    pub template: PermissionTemplate,
    /// Whether the document pre-existed outside this system and is shared in place.
    ///
    /// Such documents are never deleted.
    #[serde(default)]
    pub from_existing: bool,
}

/// A reference to a document that the provider created or shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedDocument {
    /// The provider id of the document.
    pub id: DocumentId,
    /// Where recipients open it.
    pub url: Url,
}

impl DocumentId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
