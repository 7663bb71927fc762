//! A document provider backed by the local filesystem.
//!
//! Each document lives in its own directory under the provider root, named after its id. Files
//! carry a `content` blob; every document carries a `meta.json` sidecar. Grants are recorded in
//! the sidecar rather than enforced, which is enough to observe what a distribution did.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use super::{CopyRequest, DocumentProvider, ProviderError};
use crate::{CreatedDocument, DocumentId, Permission, Principal, PrincipalId, PrincipalKind};

const META: &str = "meta.json";
const CONTENT: &str = "content";

//================================================================================================
// Types
//================================================================================================

/// Documents stored as directories under a root.
pub struct LocalProvider {
    root: PathBuf,
    /// Serialises read-modify-write cycles on metadata sidecars.
    meta_lock: Mutex<()>,
}

/// Whether a stored document is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// A regular document with content.
    File,
    /// A container for other documents.
    Folder,
}

/// The sidecar stored next to every document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// The document title.
    pub name: String,
    /// File or folder.
    pub kind: DocumentKind,
    /// The folder the document was placed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<DocumentId>,
    /// Everyone the document is shared with.
    #[serde(default)]
    pub grants: Vec<Grant>,
}

/// A single recorded grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// Who was granted access.
    pub principal: PrincipalId,
    /// What kind of principal it is.
    pub kind: PrincipalKind,
    /// The address access was granted to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The access granted.
    pub permission: Permission,
}

//================================================================================================
// Impls
//================================================================================================

impl LocalProvider {
    /// Opens (creating if needed) a provider rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ProviderError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root: std::fs::canonicalize(root)?,
            meta_lock: Mutex::new(()),
        })
    }

    /// Brings a file from disk in as a freshly authored document.
    pub fn import(&self, path: &Path, name: &str) -> Result<CreatedDocument, ProviderError> {
        let id = new_id();
        let dir = self.document_path(&id);
        std::fs::create_dir_all(&dir)?;
        std::fs::copy(path, dir.join(CONTENT))?;
        let meta = DocumentMeta {
            name: name.to_owned(),
            kind: DocumentKind::File,
            parent: None,
            grants: Vec::new(),
        };
        std::fs::write(dir.join(META), serde_json::to_vec_pretty(&meta)?)?;
        tracing::debug!(document = %id, path = %path.display(), "imported source document");
        Ok(CreatedDocument {
            url: self.url(&id)?,
            id,
        })
    }

    /// Reads a document's sidecar.
    pub fn metadata(&self, id: &DocumentId) -> Result<DocumentMeta, ProviderError> {
        match std::fs::read(self.document_path(id).join(META)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ProviderError::NotFound(id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a document exists.
    pub fn exists(&self, id: &DocumentId) -> bool {
        self.document_path(id).join(META).is_file()
    }

    /// The directory a document is stored in.
    pub fn document_path(&self, id: &DocumentId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn url(&self, id: &DocumentId) -> Result<Url, ProviderError> {
        let dir = self.document_path(id);
        Url::from_directory_path(&dir).map_err(|()| ProviderError::InvalidPath(dir))
    }

    async fn read_meta(&self, id: &DocumentId) -> Result<DocumentMeta, ProviderError> {
        match tokio::fs::read(self.document_path(id).join(META)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ProviderError::NotFound(id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_meta(&self, id: &DocumentId, meta: &DocumentMeta) -> Result<(), ProviderError> {
        let bytes = serde_json::to_vec_pretty(meta)?;
        tokio::fs::write(self.document_path(id).join(META), bytes).await?;
        Ok(())
    }

    async fn create(&self, meta: DocumentMeta) -> Result<DocumentId, ProviderError> {
        let id = new_id();
        tokio::fs::create_dir_all(self.document_path(&id)).await?;
        self.write_meta(&id, &meta).await?;
        Ok(id)
    }
}

#[async_trait]
impl DocumentProvider for LocalProvider {
    async fn copy(&self, request: CopyRequest) -> Result<CreatedDocument, ProviderError> {
        let source = self.read_meta(&request.source).await?;
        if let Some(folder) = &request.folder {
            if self.read_meta(folder).await?.kind != DocumentKind::Folder {
                return Err(ProviderError::NotAFolder(folder.clone()));
            }
        }

        let id = self
            .create(DocumentMeta {
                name: request.name,
                kind: source.kind,
                parent: request.folder,
                grants: grants(&request.grantees, request.permission),
            })
            .await?;
        if source.kind == DocumentKind::File {
            tokio::fs::copy(
                self.document_path(&request.source).join(CONTENT),
                self.document_path(&id).join(CONTENT),
            )
            .await?;
        }

        tracing::trace!(
            document = %id,
            source = %request.source,
            from_existing = request.from_existing,
            "copied"
        );
        Ok(CreatedDocument {
            url: self.url(&id)?,
            id,
        })
    }

    async fn share(
        &self,
        document: &DocumentId,
        grantees: &[Principal],
        permission: Permission,
    ) -> Result<Url, ProviderError> {
        let _guard = self.meta_lock.lock().await;
        let mut meta = self.read_meta(document).await?;
        for grant in grants(grantees, permission) {
            match meta.grants.iter_mut().find(|g| g.principal == grant.principal) {
                Some(existing) => *existing = grant,
                None => meta.grants.push(grant),
            }
        }
        self.write_meta(document, &meta).await?;
        self.url(document)
    }

    async fn create_folder(
        &self,
        name: &str,
        grantees: &[Principal],
    ) -> Result<CreatedDocument, ProviderError> {
        let id = self
            .create(DocumentMeta {
                name: name.to_owned(),
                kind: DocumentKind::Folder,
                parent: None,
                grants: grants(grantees, crate::PermissionTemplate::View.resolve()),
            })
            .await?;
        Ok(CreatedDocument {
            url: self.url(&id)?,
            id,
        })
    }

    async fn delete(&self, document: &DocumentId) -> Result<u16, ProviderError> {
        match tokio::fs::remove_dir_all(self.document_path(document)).await {
            Ok(()) => Ok(204),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(404),
            Err(e) => Err(e.into()),
        }
    }
}

//================================================================================================
// Functions
//================================================================================================

fn new_id() -> DocumentId {
    uuid::Uuid::new_v4().simple().to_string().into()
}

fn grants(grantees: &[Principal], permission: Permission) -> Vec<Grant> {
    grantees
        .iter()
        .map(|p| Grant {
            principal: p.id.clone(),
            kind: p.kind,
            email: p.email.clone(),
            permission,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PermissionTemplate, Role};

    fn provider() -> anyhow::Result<(tempfile::TempDir, LocalProvider, DocumentId)> {
        let tmp = tempfile::tempdir()?;
        let provider = LocalProvider::open(tmp.path().join("docs"))?;
        let src = tmp.path().join("essay.txt");
        std::fs::write(&src, "Write about cells.")?;
        let doc = provider.import(&src, "Essay")?;
        Ok((tmp, provider, doc.id))
    }

    #[tokio::test]
    async fn copy_into_folder() -> anyhow::Result<()> {
        let (_tmp, provider, source) = provider()?;
        let ada = Principal::student("ada", "Ada", Some("ada@example.edu".into()));

        let folder = provider.create_folder("Essay - Red", &[]).await?;
        let copy = provider
            .copy(CopyRequest {
                source: source.clone(),
                folder: Some(folder.id.clone()),
                name: "Essay - Ada".into(),
                grantees: vec![ada],
                permission: PermissionTemplate::Edit.resolve(),
                from_existing: false,
            })
            .await?;

        let meta = provider.metadata(&copy.id)?;
        assert_eq!(meta.parent, Some(folder.id));
        assert_eq!(meta.grants.len(), 1);
        assert_eq!(meta.grants[0].permission.role, Role::Writer);
        let content = std::fs::read_to_string(provider.document_path(&copy.id).join(CONTENT))?;
        assert_eq!(content, "Write about cells.");
        assert_eq!(copy.url.scheme(), "file");
        Ok(())
    }

    #[tokio::test]
    async fn copy_into_a_file_is_refused() -> anyhow::Result<()> {
        let (_tmp, provider, source) = provider()?;
        let res = provider
            .copy(CopyRequest {
                source: source.clone(),
                folder: Some(source.clone()),
                name: "nope".into(),
                grantees: Vec::new(),
                permission: PermissionTemplate::View.resolve(),
                from_existing: false,
            })
            .await;
        assert!(matches!(res, Err(ProviderError::NotAFolder(id)) if id == source));
        Ok(())
    }

    #[tokio::test]
    async fn share_replaces_existing_grant() -> anyhow::Result<()> {
        let (_tmp, provider, source) = provider()?;
        let ada = Principal::student("ada", "Ada", None);

        provider
            .share(&source, &[ada.clone()], PermissionTemplate::Edit.resolve())
            .await?;
        provider
            .share(&source, &[ada], PermissionTemplate::Comment.resolve())
            .await?;

        let meta = provider.metadata(&source)?;
        assert_eq!(meta.grants.len(), 1);
        assert_eq!(meta.grants[0].permission.role, Role::Commenter);
        Ok(())
    }

    #[tokio::test]
    async fn delete_reports_status() -> anyhow::Result<()> {
        let (_tmp, provider, source) = provider()?;
        assert_eq!(provider.delete(&source).await?, 204);
        assert!(!provider.exists(&source));
        assert_eq!(provider.delete(&source).await?, 404);

        let res = provider.share(&source, &[], PermissionTemplate::View.resolve()).await;
        assert!(matches!(res, Err(ProviderError::NotFound(_))));
        Ok(())
    }
}
