use anyhow::Result;

use crate::bootstrap::Settings;
use crate::render;

pub async fn list(settings: &Settings) -> Result<()> {
    let (_, hydration) = super::read_state(settings).await?;
    render::print_sessions(hydration.store.sessions(), hydration.store.active_id());
    Ok(())
}
