use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use ordagg_core::{Application, ApplicationTemplate, Webhook};
use ordagg_storage::{CatalogStore, CatalogTransaction, StorageError};

use crate::state::CatalogState;
use crate::stats::MutationStats;
use crate::transaction::InMemoryTransaction;

/// Injected failure, used to exercise error paths of callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailPoint {
    /// Fail the n-th (0-based) call to `list_applications_page`.
    ApplicationPage(usize),
    /// Fail `lock_application` for this application.
    LockApplication(String),
    /// Fail `list_vendors` for the global scope.
    ListGlobalVendors,
    /// Fail every `update_specification`.
    UpdateSpecification,
    /// Fail `begin`.
    Begin,
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) state: Mutex<CatalogState>,
    pub(crate) row_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    pub(crate) stats: Arc<MutationStats>,
    pub(crate) failpoints: Mutex<Vec<FailPoint>>,
    pub(crate) page_calls: AtomicUsize,
}

impl Shared {
    pub(crate) fn should_fail(&self, point: &FailPoint) -> bool {
        self.failpoints.lock().iter().any(|fp| fp == point)
    }

    pub(crate) fn next_page_call(&self) -> usize {
        self.page_calls.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn row_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            self.row_locks
                .lock()
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

/// In-memory catalog backend.
///
/// Cloning is cheap and clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Seeding ====================

    /// Registers an application owned by `tenant`.
    pub fn add_application(&self, app: Application, tenant: &str) {
        let mut state = self.shared.state.lock();
        state.tenants.insert(app.id.clone(), tenant.to_string());
        state.applications.insert(app.id.clone(), app);
    }

    pub fn add_application_template(&self, template: ApplicationTemplate) {
        self.shared
            .state
            .lock()
            .application_templates
            .insert(template.id.clone(), template);
    }

    /// Sets the `applicationType` label of an application.
    pub fn set_application_type(&self, app_id: &str, application_type: &str) {
        self.shared
            .state
            .lock()
            .application_types
            .insert(app_id.to_string(), application_type.to_string());
    }

    pub fn add_webhook(&self, webhook: Webhook) {
        self.shared
            .state
            .lock()
            .webhooks
            .insert(webhook.id.clone(), webhook);
    }

    pub fn inject_failure(&self, point: FailPoint) {
        self.shared.failpoints.lock().push(point);
    }

    pub fn clear_failures(&self) {
        self.shared.failpoints.lock().clear();
        self.shared.page_calls.store(0, Ordering::SeqCst);
    }

    // ==================== Inspection ====================

    /// Call counters shared by every transaction of this store.
    pub fn stats(&self) -> Arc<MutationStats> {
        Arc::clone(&self.shared.stats)
    }

    /// A copy of all tables as currently visible.
    pub fn snapshot(&self) -> CatalogState {
        self.shared.state.lock().clone()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, StorageError> {
        if self.shared.should_fail(&FailPoint::Begin) {
            return Err(StorageError::transaction_error("begin failed"));
        }
        Ok(Box::new(InMemoryTransaction::new(Arc::clone(&self.shared))))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
