//! Session store — one [`WorkflowEngine`] per dashboard session.
//!
//! A session stands in for a mounted UI component: creating one mounts a
//! fresh idle workflow, removing one unmounts it and cancels whatever it had
//! scheduled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::{RegistryError, Result};
use crate::workflow::{MetricsProvider, WorkflowEngine, WorkflowKind};

pub struct Sessions<K: WorkflowKind> {
    kind: Arc<K>,
    metrics: Arc<dyn MetricsProvider>,
    shutdown: CancellationToken,
    next_id: AtomicU64,
    engines: RwLock<HashMap<u64, Arc<WorkflowEngine<K>>>>,
}

impl<K: WorkflowKind> Sessions<K> {
    pub fn new(kind: K, metrics: Arc<dyn MetricsProvider>, shutdown: CancellationToken) -> Self {
        Self {
            kind: Arc::new(kind),
            metrics,
            shutdown,
            next_id: AtomicU64::new(1),
            engines: RwLock::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub async fn create(&self) -> (u64, Arc<WorkflowEngine<K>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let engine = Arc::new(WorkflowEngine::new(
            Arc::clone(&self.kind),
            Arc::clone(&self.metrics),
            self.shutdown.child_token(),
        ));
        self.engines.write().await.insert(id, Arc::clone(&engine));
        info!("{} session {id} created", K::NAME);
        (id, engine)
    }

    pub async fn get(&self, id: u64) -> Result<Arc<WorkflowEngine<K>>> {
        self.engines
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::SessionNotFound(id))
    }

    /// Remove the session and cancel its pending work.
    pub async fn remove(&self, id: u64) -> Result<()> {
        let engine = self
            .engines
            .write()
            .await
            .remove(&id)
            .ok_or(RegistryError::SessionNotFound(id))?;
        engine.discard();
        info!("{} session {id} removed", K::NAME);
        Ok(())
    }
}
