//! Activity and roster files given on the command line.
//!
//! An activity file names the course, the mode and where the source document comes from:
//!
//! ```toml
//! id = "essay"
//! name = "Cell essay"
//! course = "bio101"
//! mode = "group_copy"
//! permission = "edit"
//!
//! [source]
//! path = "essay.txt"
//!
//! [selection]
//! groups = ["red", "blue"]
//! ```
//!
//! A `source.path` is imported as a fresh document. A `source.document` names a document the
//! provider already holds; it is shared in place and never deleted.

use std::path::{Path, PathBuf};

use fanout::provider::{LocalProvider, ProviderError};
use fanout::roster::{DirectoryError, Selection, StaticDirectory};
use fanout::store::{ActivityId, ActivityRecord};
use fanout::{CourseId, DistributionMode, DocumentId, PermissionTemplate, SourceDocument};
use serde::Deserialize;
use thiserror::Error;

//================================================================================================
// Types
//================================================================================================

#[derive(Error, Debug)]
pub(super) enum InputError {
    #[error("could not read `{1}`")]
    Read(#[source] std::io::Error, PathBuf),
    #[error(transparent)]
    Parse(#[from] toml_edit::de::Error),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("the activity source needs exactly one of `path` or `document`")]
    Source,
    #[error("document `{0}` does not exist in the provider")]
    MissingDocument(DocumentId),
}

#[derive(Deserialize, Debug)]
pub(super) struct ActivityFile {
    pub(super) id: ActivityId,
    pub(super) name: String,
    pub(super) course: CourseId,
    pub(super) mode: DistributionMode,
    #[serde(default = "default_permission")]
    pub(super) permission: PermissionTemplate,
    pub(super) source: SourceFile,
    #[serde(default)]
    pub(super) selection: Selection,
    #[serde(skip)]
    dir: PathBuf,
}

#[derive(Deserialize, Debug)]
pub(super) struct SourceFile {
    path: Option<PathBuf>,
    document: Option<DocumentId>,
    name: Option<String>,
    owner: Option<String>,
}

//================================================================================================
// Impls
//================================================================================================

impl ActivityFile {
    pub(super) fn load(path: &Path) -> Result<Self, InputError> {
        let toml = read(path)?;
        let mut file: ActivityFile = toml_edit::de::from_str(&toml)?;
        file.dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        if file.source.path.is_some() == file.source.document.is_some() {
            return Err(InputError::Source);
        }
        Ok(file)
    }

    /// The source as it would be distributed, without touching the provider.
    pub(super) fn preview(&self) -> SourceDocument {
        let id = match (&self.source.document, &self.source.path) {
            (Some(id), _) => id.clone(),
            (None, Some(path)) => path.display().to_string().into(),
            (None, None) => DocumentId::from("<source>"),
        };
        self.source_document(id)
    }

    /// Resolves the source against the provider, importing it if it is a local file.
    pub(super) fn into_record(self, provider: &LocalProvider) -> Result<ActivityRecord, InputError> {
        let source = match (&self.source.document, &self.source.path) {
            (Some(id), _) => {
                if !provider.exists(id) {
                    return Err(InputError::MissingDocument(id.clone()));
                }
                self.source_document(id.clone())
            },
            (None, Some(path)) => {
                let created = provider.import(&self.dir.join(path), self.source_name())?;
                tracing::info!(document = %created.id, path = %path.display(), "imported source");
                self.source_document(created.id)
            },
            (None, None) => return Err(InputError::Source),
        };
        Ok(ActivityRecord {
            id: self.id,
            name: self.name,
            course: self.course,
            mode: self.mode,
            shared: false,
            source,
            selection: self.selection,
        })
    }

    fn source_name(&self) -> &str {
        self.source.name.as_deref().unwrap_or(&self.name)
    }

    fn source_document(&self, id: DocumentId) -> SourceDocument {
        SourceDocument {
            id,
            name: self.source_name().to_owned(),
            owner: self.source.owner.clone(),
            template: self.permission,
            from_existing: self.source.document.is_some(),
        }
    }
}

//================================================================================================
// Functions
//================================================================================================

fn default_permission() -> PermissionTemplate {
    PermissionTemplate::Edit
}

fn read(path: &Path) -> Result<String, InputError> {
    std::fs::read_to_string(path).map_err(|e| InputError::Read(e, path.to_owned()))
}

pub(super) fn load_roster(path: &Path) -> Result<StaticDirectory, InputError> {
    Ok(StaticDirectory::from_toml(&read(path)?)?)
}
