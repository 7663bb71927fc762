//! # Persisted State
//!
//! Activities and the results of distributing them outlive a single run. An [`ActivityStore`]
//! holds one [`ActivityRecord`] per activity and one [`ResultRecord`] per document delivered to a
//! student, so that later runs can report status and accept submissions.
//!
//! ## Backends
//!
//! - [`JsonStore`] - one directory per activity holding `activity.json` and `results.json`,
//!   written atomically through a temporary file.
//! - [`MemoryStore`] - a process-local map, for tests and dry runs.

use std::collections::HashMap;
use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use thiserror::Error;
use url::Url;

use crate::roster::Selection;
use crate::{CourseId, DistributionMode, DocumentId, PermissionTemplate, PrincipalId, SourceDocument};

const ACTIVITY: &str = "activity.json";
const RESULTS: &str = "results.json";

//================================================================================================
// Types
//================================================================================================

/// Identifies an activity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(String);

/// An activity as configured by its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// The activity id.
    pub id: ActivityId,
    /// A human readable title.
    pub name: String,
    /// The course the activity belongs to.
    pub course: CourseId,
    /// How the source is distributed.
    pub mode: DistributionMode,
    /// Set once a distribution has completed and its cleanup has run.
    #[serde(default)]
    pub shared: bool,
    /// The document distributed.
    pub source: SourceDocument,
    /// The groups and groupings distributed through.
    #[serde(default)]
    pub selection: Selection,
}

/// Whether a student has handed their document in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Still being worked on.
    #[default]
    NotSubmitted,
    /// Handed in; the student can only comment from here on.
    Submitted,
}

/// One document delivered to one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// The student.
    pub recipient: PrincipalId,
    /// The address access was granted to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The group or grouping the document was delivered through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<PrincipalId>,
    /// The delivered document.
    pub document: DocumentId,
    /// Where the student opens it.
    pub url: Url,
    /// The access granted.
    pub permission: PermissionTemplate,
    /// Submission state.
    #[serde(default)]
    pub status: SubmissionStatus,
}

/// Errors raised by a store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No activity with this id was saved.
    #[error("activity `{0}` not found")]
    NotFound(ActivityId),
    /// A record could not be (de)serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A temporary file could not be moved into place.
    #[error(transparent)]
    Persist(#[from] tempfile::PersistError),
    /// Another thread panicked while holding the store.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Where activities and their results are kept.
pub trait ActivityStore: Send + Sync {
    /// Saves (or overwrites) an activity.
    fn save_activity(&self, activity: &ActivityRecord) -> Result<(), StoreError>;
    /// Loads an activity.
    fn load_activity(&self, id: &ActivityId) -> Result<ActivityRecord, StoreError>;
    /// Every saved activity.
    fn activities(&self) -> Result<Vec<ActivityId>, StoreError>;
    /// Sets the activity's sharing flag.
    fn mark_shared(&self, id: &ActivityId) -> Result<(), StoreError>;
    /// Adds result records to an activity.
    fn append_results(&self, id: &ActivityId, results: &[ResultRecord]) -> Result<(), StoreError>;
    /// Every result record of an activity.
    fn load_results(&self, id: &ActivityId) -> Result<Vec<ResultRecord>, StoreError>;
    /// Replaces every result record of an activity.
    fn replace_results(&self, id: &ActivityId, results: Vec<ResultRecord>)
    -> Result<(), StoreError>;
}

/// A store keeping JSON files on disk.
#[derive(Debug)]
pub struct JsonStore {
    root: PathBuf,
    lock: Mutex<()>,
}

/// A store keeping everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    activities: Mutex<HashMap<ActivityId, (ActivityRecord, Vec<ResultRecord>)>>,
}

//================================================================================================
// Impls
//================================================================================================

impl ActivityId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActivityId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ActivityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubmissionStatus::NotSubmitted => "not submitted",
            SubmissionStatus::Submitted => "submitted",
        })
    }
}

impl JsonStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    fn dir(&self, id: &ActivityId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn read<T: DeserializeOwned>(&self, id: &ActivityId, file: &str) -> Result<T, StoreError> {
        match std::fs::read(self.dir(id).join(file)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    fn read_results(&self, id: &ActivityId) -> Result<Vec<ResultRecord>, StoreError> {
        // an activity that was never distributed has no results file yet
        if !self.dir(id).join(ACTIVITY).is_file() {
            return Err(StoreError::NotFound(id.clone()));
        }
        match self.read(id, RESULTS) {
            Err(StoreError::NotFound(_)) => Ok(Vec::new()),
            res => res,
        }
    }

    fn write<T: Serialize + ?Sized>(
        &self,
        id: &ActivityId,
        file: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let dir = self.dir(id);
        std::fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::with_prefix_in(format!(".{file}"), &dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(value)?)?;
        tmp.persist(dir.join(file))?;
        Ok(())
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, StoreError> {
        self.lock.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl ActivityStore for JsonStore {
    fn save_activity(&self, activity: &ActivityRecord) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        self.write(&activity.id, ACTIVITY, activity)
    }

    fn load_activity(&self, id: &ActivityId) -> Result<ActivityRecord, StoreError> {
        self.read(id, ACTIVITY)
    }

    fn activities(&self) -> Result<Vec<ActivityId>, StoreError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.join(ACTIVITY).is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    ids.push(ActivityId::from(name));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn mark_shared(&self, id: &ActivityId) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        let mut activity: ActivityRecord = self.read(id, ACTIVITY)?;
        activity.shared = true;
        self.write(id, ACTIVITY, &activity)
    }

    fn append_results(&self, id: &ActivityId, results: &[ResultRecord]) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        let mut all = self.read_results(id)?;
        all.extend_from_slice(results);
        self.write(id, RESULTS, &all)
    }

    fn load_results(&self, id: &ActivityId) -> Result<Vec<ResultRecord>, StoreError> {
        self.read_results(id)
    }

    fn replace_results(
        &self,
        id: &ActivityId,
        results: Vec<ResultRecord>,
    ) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        self.read_results(id)?;
        self.write(id, RESULTS, &results)
    }
}

impl MemoryStore {
    fn with<T>(
        &self,
        id: &ActivityId,
        f: impl FnOnce(&mut ActivityRecord, &mut Vec<ResultRecord>) -> T,
    ) -> Result<T, StoreError> {
        let mut activities = self.activities.lock().map_err(|_| StoreError::Poisoned)?;
        let (activity, results) = activities
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Ok(f(activity, results))
    }
}

impl ActivityStore for MemoryStore {
    fn save_activity(&self, activity: &ActivityRecord) -> Result<(), StoreError> {
        let mut activities = self.activities.lock().map_err(|_| StoreError::Poisoned)?;
        activities
            .entry(activity.id.clone())
            .and_modify(|(a, _)| *a = activity.clone())
            .or_insert_with(|| (activity.clone(), Vec::new()));
        Ok(())
    }

    fn load_activity(&self, id: &ActivityId) -> Result<ActivityRecord, StoreError> {
        self.with(id, |a, _| a.clone())
    }

    fn activities(&self) -> Result<Vec<ActivityId>, StoreError> {
        let activities = self.activities.lock().map_err(|_| StoreError::Poisoned)?;
        let mut ids: Vec<_> = activities.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn mark_shared(&self, id: &ActivityId) -> Result<(), StoreError> {
        self.with(id, |a, _| a.shared = true)
    }

    fn append_results(&self, id: &ActivityId, results: &[ResultRecord]) -> Result<(), StoreError> {
        self.with(id, |_, r| r.extend_from_slice(results))
    }

    fn load_results(&self, id: &ActivityId) -> Result<Vec<ResultRecord>, StoreError> {
        self.with(id, |_, r| r.clone())
    }

    fn replace_results(
        &self,
        id: &ActivityId,
        results: Vec<ResultRecord>,
    ) -> Result<(), StoreError> {
        self.with(id, |_, r| *r = results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::activity;

    fn result(student: &str) -> ResultRecord {
        ResultRecord {
            recipient: student.into(),
            email: None,
            container: None,
            document: format!("copy-{student}").into(),
            url: Url::parse(&format!("https://docs.example.com/d/copy-{student}")).unwrap(),
            permission: PermissionTemplate::Edit,
            status: SubmissionStatus::NotSubmitted,
        }
    }

    fn round_trip(store: &dyn ActivityStore) -> anyhow::Result<()> {
        let record = activity(DistributionMode::GroupCopy);
        assert!(matches!(
            store.load_activity(&record.id),
            Err(StoreError::NotFound(_))
        ));

        store.save_activity(&record)?;
        assert!(store.load_results(&record.id)?.is_empty());
        store.append_results(&record.id, &[result("ada")])?;
        store.append_results(&record.id, &[result("grace")])?;
        assert_eq!(store.load_results(&record.id)?.len(), 2);

        store.replace_results(&record.id, vec![result("alan")])?;
        let results = store.load_results(&record.id)?;
        assert_eq!(results, [result("alan")]);

        store.mark_shared(&record.id)?;
        let loaded = store.load_activity(&record.id)?;
        assert!(loaded.shared);
        assert_eq!(loaded.selection, record.selection);
        assert_eq!(store.activities()?, [record.id]);
        Ok(())
    }

    #[test]
    fn memory_store() -> anyhow::Result<()> {
        round_trip(&MemoryStore::default())
    }

    #[test]
    fn json_store() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        let store = JsonStore::open(tmp.path())?;
        round_trip(&store)?;

        let on_disk = std::fs::read_to_string(tmp.path().join("essay").join(RESULTS))?;
        assert!(on_disk.contains("\"status\": \"not_submitted\""));
        Ok(())
    }

    #[test]
    fn results_of_unknown_activities() {
        let store = MemoryStore::default();
        let err = store.append_results(&"nope".into(), &[]).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id.as_str() == "nope"));
    }
}
