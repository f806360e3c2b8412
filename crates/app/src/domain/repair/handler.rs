//! Task handlers.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
};

use async_trait::async_trait;
use mockall::automock;
use tracing::info;

use crate::domain::{
    products::store::ProductStore,
    repair::{errors::TaskError, tasks::RepairTask},
};

/// Executes one task type.
#[automock]
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Result<(), TaskError>;
}

/// Points products at the replacement thumbnail. Safe to run repeatedly.
#[derive(Clone)]
pub struct UpdateThumbnailHandler {
    store: Arc<dyn ProductStore>,
}

impl Debug for UpdateThumbnailHandler {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("UpdateThumbnailHandler")
            .finish_non_exhaustive()
    }
}

impl UpdateThumbnailHandler {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskHandler for UpdateThumbnailHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), TaskError> {
        let task: RepairTask = serde_json::from_slice(payload).map_err(TaskError::Decode)?;

        let rewritten = self
            .store
            .update_all_thumbnail(&task.old_thumbnail, &task.new_thumbnail)
            .await
            .map_err(TaskError::Store)?;

        info!(
            old = %task.old_thumbnail,
            new = %task.new_thumbnail,
            products = rewritten,
            "repaired thumbnail references"
        );

        Ok(())
    }
}
