//! # Entry Execution
//!
//! A plan entry becomes a [`Call`] once it is bound to the documents it depends on, and an
//! [`Executor`] performs that call against the provider. Each call holds a permit from a shared
//! semaphore for its whole lifetime and is abandoned after the configured timeout, so a provider
//! that never answers costs one failed entry rather than a stuck distribution.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::plan::{NodeId, Operation, Parent, PlanEntry};
use crate::provider::{CopyRequest, DocumentProvider, ProviderError};
use crate::{CreatedDocument, DocumentId, Permission, Principal, Settings, SourceDocument};

//================================================================================================
// Types
//================================================================================================

/// Why a single entry produced no document.
#[derive(Error, Debug)]
pub enum EntryFailure {
    /// The provider rejected the call.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The provider did not answer in time.
    #[error("provider call timed out after {0:?}")]
    TimedOut(Duration),
    /// The task running the call was cancelled or panicked.
    #[error("provider call aborted: {0}")]
    Aborted(String),
    /// The entry was dispatched without the document its parent produced.
    #[error("entry dispatched before its parent document existed")]
    Unbound,
    /// The executor shut down before the call could start.
    #[error("executor closed")]
    Closed,
}

/// What a bound entry asks of the provider.
#[derive(Debug, Clone)]
pub enum Request {
    /// Copy a document.
    Copy(CopyRequest),
    /// Grant access to an existing document.
    Share {
        /// The document shared.
        document: DocumentId,
        /// Who receives access.
        grantees: Vec<Principal>,
        /// The access granted.
        permission: Permission,
    },
    /// Create a folder.
    CreateFolder {
        /// The folder title.
        name: String,
        /// Who may see the folder.
        grantees: Vec<Principal>,
    },
}

/// A plan entry bound to concrete documents and ready to run.
#[derive(Debug, Clone)]
pub struct Call {
    node: NodeId,
    request: Request,
}

/// The single result every dispatched entry produces.
#[derive(Debug)]
pub struct OperationResult {
    /// The entry the result belongs to.
    pub node: NodeId,
    /// The document created or shared, or why there is none.
    pub outcome: Result<CreatedDocument, EntryFailure>,
}

/// Runs calls against a provider with bounded concurrency and a per-call timeout.
pub struct Executor<P: ?Sized> {
    provider: Arc<P>,
    timeout: Duration,
    limiter: Arc<Semaphore>,
}

//================================================================================================
// Impls
//================================================================================================

impl Call {
    /// Binds an entry to the source and, for deferred entries, to its parent's document.
    ///
    /// Returns `None` when the entry has a parent entry but no parent document was given.
    pub fn bind(
        entry: &PlanEntry,
        source: &SourceDocument,
        parent: Option<&CreatedDocument>,
        permission: Permission,
    ) -> Option<Self> {
        let parent = match entry.parent() {
            Parent::Source => None,
            Parent::Node(_) => Some(parent?),
        };
        let recipient = entry.recipient();
        let name = format!("{} - {}", source.name, recipient.name());

        let request = match entry.operation() {
            Operation::Copy => Request::Copy(CopyRequest {
                source: source.id.clone(),
                folder: parent.map(|p| p.id.clone()),
                name,
                grantees: recipient.grantees(),
                permission,
                from_existing: source.from_existing,
            }),
            Operation::Share => Request::Share {
                document: parent.map_or_else(|| source.id.clone(), |p| p.id.clone()),
                grantees: recipient.grantees(),
                permission,
            },
            Operation::CreateFolder => Request::CreateFolder {
                name,
                grantees: recipient.grantees(),
            },
        };

        Some(Self {
            node: entry.id(),
            request,
        })
    }

    /// The entry this call performs.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The provider request.
    pub fn request(&self) -> &Request {
        &self.request
    }
}

impl<P: ?Sized> Clone for Executor<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            timeout: self.timeout,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<P: DocumentProvider + ?Sized> Executor<P> {
    /// An executor bounded by `settings`.
    pub fn new(provider: Arc<P>, settings: &Settings) -> Self {
        Self {
            provider,
            timeout: settings.call_timeout,
            limiter: Arc::new(Semaphore::new(settings.max_concurrent.max(1))),
        }
    }

    /// Performs a call, always yielding exactly one result.
    pub async fn execute(self, call: Call) -> OperationResult {
        let node = call.node;
        let outcome = self.run(call.request).await;
        if let Err(e) = &outcome {
            tracing::debug!(entry = %node, error = %e, "entry failed");
        }
        OperationResult { node, outcome }
    }

    /// Stops admitting new calls; calls waiting for a permit fail with [`EntryFailure::Closed`].
    pub fn close(&self) {
        self.limiter.close();
    }

    async fn run(&self, request: Request) -> Result<CreatedDocument, EntryFailure> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| EntryFailure::Closed)?;

        let provider = &self.provider;
        let call = async {
            match request {
                Request::Copy(request) => provider.copy(request).await,
                Request::Share {
                    document,
                    grantees,
                    permission,
                } => {
                    let url = provider.share(&document, &grantees, permission).await?;
                    Ok(CreatedDocument { id: document, url })
                },
                Request::CreateFolder { name, grantees } => {
                    provider.create_folder(&name, &grantees).await
                },
            }
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(res) => Ok(res?),
            Err(_) => Err(EntryFailure::TimedOut(self.timeout)),
        }
    }
}
