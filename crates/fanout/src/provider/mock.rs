//! An in-memory provider for tests.
//!
//! Documents only exist once created, so a share or a copy into a folder that arrives before
//! its parent has been created fails with `NotFound`. Per-principal delays make call
//! interleavings observable under a paused clock.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::{CopyRequest, DocumentProvider, ProviderError};
use crate::{CreatedDocument, DocumentId, Permission, Principal, PrincipalId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Copy {
        source: DocumentId,
        folder: Option<DocumentId>,
        grantee: Option<PrincipalId>,
        created: Option<DocumentId>,
    },
    Share {
        document: DocumentId,
        grantees: Vec<PrincipalId>,
    },
    Folder {
        created: DocumentId,
    },
    Delete(DocumentId),
}

#[derive(Default)]
struct State {
    docs: HashSet<DocumentId>,
    calls: Vec<Call>,
    next: usize,
}

#[derive(Default)]
pub(crate) struct MockProvider {
    state: Mutex<State>,
    delays: HashMap<PrincipalId, Duration>,
    failing: HashSet<PrincipalId>,
    failing_deletes: bool,
}

impl MockProvider {
    pub(crate) fn with_document(id: &str) -> Self {
        let provider = Self::default();
        provider.state.lock().unwrap().docs.insert(id.into());
        provider
    }

    /// Calls targeting `principal` take `delay` to return.
    pub(crate) fn delay(mut self, principal: &str, delay: Duration) -> Self {
        self.delays.insert(principal.into(), delay);
        self
    }

    /// Calls targeting `principal` fail.
    pub(crate) fn fail(mut self, principal: &str) -> Self {
        self.failing.insert(principal.into());
        self
    }

    pub(crate) fn fail_deletes(mut self) -> Self {
        self.failing_deletes = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn deletes(&self) -> Vec<DocumentId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn exists(&self, id: &DocumentId) -> bool {
        self.state.lock().unwrap().docs.contains(id)
    }

    async fn wait(&self, grantees: &[Principal]) -> Result<(), ProviderError> {
        let delay = grantees
            .iter()
            .filter_map(|p| self.delays.get(&p.id))
            .max()
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match grantees.iter().find(|p| self.failing.contains(&p.id)) {
            Some(p) => Err(ProviderError::Quota(format!("no space left for {}", p.id))),
            None => Ok(()),
        }
    }

    fn url(id: &DocumentId) -> Url {
        Url::parse(&format!("https://docs.example.com/d/{id}")).unwrap()
    }
}

#[async_trait]
impl DocumentProvider for MockProvider {
    async fn copy(&self, request: CopyRequest) -> Result<CreatedDocument, ProviderError> {
        let res = self.wait(&request.grantees).await;
        let mut state = self.state.lock().unwrap();
        let mut call = Call::Copy {
            source: request.source.clone(),
            folder: request.folder.clone(),
            grantee: request.grantees.first().map(|p| p.id.clone()),
            created: None,
        };
        let outcome = res.and_then(|()| {
            if !state.docs.contains(&request.source) {
                return Err(ProviderError::NotFound(request.source.clone()));
            }
            if let Some(folder) = request.folder.as_ref().filter(|f| !state.docs.contains(*f)) {
                return Err(ProviderError::NotFound(folder.clone()));
            }
            state.next += 1;
            let id: DocumentId = format!("copy-{}", state.next).into();
            state.docs.insert(id.clone());
            if let Call::Copy { created, .. } = &mut call {
                *created = Some(id.clone());
            }
            Ok(CreatedDocument {
                url: Self::url(&id),
                id,
            })
        });
        state.calls.push(call);
        outcome
    }

    async fn share(
        &self,
        document: &DocumentId,
        grantees: &[Principal],
        _permission: Permission,
    ) -> Result<Url, ProviderError> {
        let res = self.wait(grantees).await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Share {
            document: document.clone(),
            grantees: grantees.iter().map(|p| p.id.clone()).collect(),
        });
        res?;
        if state.docs.contains(document) {
            Ok(Self::url(document))
        } else {
            Err(ProviderError::NotFound(document.clone()))
        }
    }

    async fn create_folder(
        &self,
        _name: &str,
        grantees: &[Principal],
    ) -> Result<CreatedDocument, ProviderError> {
        self.wait(grantees).await?;
        let mut state = self.state.lock().unwrap();
        state.next += 1;
        let id: DocumentId = format!("folder-{}", state.next).into();
        state.docs.insert(id.clone());
        state.calls.push(Call::Folder { created: id.clone() });
        Ok(CreatedDocument {
            url: Self::url(&id),
            id,
        })
    }

    async fn delete(&self, document: &DocumentId) -> Result<u16, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete(document.clone()));
        if self.failing_deletes {
            return Err(ProviderError::Network("connection reset".into()));
        }
        Ok(if state.docs.remove(document) { 204 } else { 404 })
    }
}
