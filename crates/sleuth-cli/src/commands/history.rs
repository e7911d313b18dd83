use anyhow::{Result, bail};
use colored::Colorize;

use crate::bootstrap::Settings;
use crate::render;
use crate::selector;

/// Prints the stored messages of the session referenced by `reference`
/// (a listing position, an id, or an id prefix).
pub async fn show(settings: &Settings, reference: &str) -> Result<()> {
    let (gateway, hydration) = super::read_state(settings).await?;

    let Some(id) = selector::resolve(hydration.store.sessions(), reference) else {
        bail!("No session matches '{reference}'");
    };
    if let Some(session) = hydration.store.get(&id) {
        println!(
            "{} {}",
            session.tag.bold(),
            session.subject_address.bright_black()
        );
        println!();
    }

    render::print_history(&gateway.load_messages(&id).await?);
    Ok(())
}
