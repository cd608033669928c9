//! Shared command wiring: config, database, and service construction.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::domain::models::Config;
use crate::domain::ports::RunStore;
use crate::infrastructure::blob::LocalBlobStore;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::database::{DatabaseConnection, SqliteRunStore};
use crate::infrastructure::stage::HttpStageClient;
use crate::services::{ArtifactService, BudgetGate, LifecycleOrchestrator};

/// Everything a command handler needs, built once per invocation.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn RunStore>,
    pub lifecycle: LifecycleOrchestrator,
    pub artifacts: ArtifactService,
}

impl AppContext {
    pub async fn init() -> Result<Self> {
        let config = ConfigLoader::load()?;

        let db = DatabaseConnection::new(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to open database. Run 'tribunal init' first.")?;
        db.migrate().await?;

        let store: Arc<dyn RunStore> = Arc::new(SqliteRunStore::new(db.pool().clone()));
        let stage_client = Arc::new(HttpStageClient::new(&config.stage)?);
        let blobs = Arc::new(LocalBlobStore::new(config.blob.root.clone()));

        let gate = BudgetGate::new(config.budget.clone());
        let lifecycle = LifecycleOrchestrator::new(store.clone(), stage_client, gate);
        let artifacts = ArtifactService::new(store.clone(), blobs);

        Ok(Self {
            config,
            store,
            lifecycle,
            artifacts,
        })
    }
}
