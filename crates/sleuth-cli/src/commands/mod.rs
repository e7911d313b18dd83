pub mod config;
pub mod history;
pub mod sessions;

use std::sync::Arc;

use anyhow::{Context, Result};
use sleuth_application::{Hydration, PersistenceGateway};
use sleuth_infrastructure::FileKeyValueStore;

use crate::bootstrap::Settings;

/// Reads persisted state without contacting the backend.
async fn read_state(settings: &Settings) -> Result<(PersistenceGateway, Hydration)> {
    let state_dir = settings.paths.state_dir()?;
    let storage = FileKeyValueStore::new(&state_dir)
        .await
        .with_context(|| format!("Failed to open state directory {}", state_dir.display()))?;

    let gateway = PersistenceGateway::new(Arc::new(storage));
    let hydration = gateway.hydrate().await.context("Failed to read sessions")?;
    Ok((gateway, hydration))
}
