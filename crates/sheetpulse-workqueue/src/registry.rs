//! Executors keyed by service.

use std::collections::HashMap;
use std::sync::Arc;

use sheetpulse_protocols::{Service, SyncExecutor};

/// Executors available to the worker pool.
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<Service, Arc<dyn SyncExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under the service it reports; replaces any previous one.
    pub fn register(&mut self, executor: Arc<dyn SyncExecutor>) {
        self.executors.insert(executor.service(), executor);
    }

    pub fn get(&self, service: Service) -> Option<Arc<dyn SyncExecutor>> {
        self.executors.get(&service).cloned()
    }

    pub fn services(&self) -> Vec<Service> {
        let mut services: Vec<_> = self.executors.keys().copied().collect();
        services.sort();
        services
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
