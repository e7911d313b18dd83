use anyhow::Result;
use colored::Colorize;
use sleuth_infrastructure::ConfigService;

use crate::bootstrap::Settings;

pub fn path(settings: &Settings) -> Result<()> {
    println!("{}", settings.config_path.display());
    Ok(())
}

/// Writes a commented template unless a file already exists.
pub fn init(settings: &Settings) -> Result<()> {
    let service = ConfigService::new(settings.config_path.clone());
    if service.ensure_exists()? {
        println!("{} {}", "Created".bright_green(), settings.config_path.display());
    } else {
        println!(
            "{} {}",
            "Already exists:".bright_black(),
            settings.config_path.display()
        );
    }
    Ok(())
}

/// Prints the effective configuration after all overrides.
pub fn show(settings: &Settings) -> Result<()> {
    let data_dir = settings.paths.data_dir()?;
    println!("config file   {}", settings.config_path.display());
    println!("backend url   {}", settings.config.backend.base_url);
    println!(
        "timeout       {}s",
        settings.config.backend.request_timeout_secs
    );
    println!("poll interval {:?}", settings.config.polling.interval());
    println!("data dir      {}", data_dir.display());
    Ok(())
}
