use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sleuth_application::InvestigationService;
use sleuth_core::config::SleuthConfig;
use sleuth_infrastructure::{ConfigService, FileKeyValueStore, HttpAnalysisBackend, SleuthPaths};

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub backend_url: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: SleuthConfig,
    pub config_path: PathBuf,
    pub paths: SleuthPaths,
}

/// Resolves the configuration: defaults, then `config.toml`, then the
/// environment, then command-line flags.
pub fn resolve_settings(overrides: &Overrides) -> Result<Settings> {
    let config_service = match &overrides.config {
        Some(path) => ConfigService::new(path.clone()),
        None => ConfigService::default_location()?,
    };

    let mut config = config_service
        .load_with_env()
        .with_context(|| format!("Failed to load {}", config_service.path().display()))?;
    apply_cli_overrides(&mut config, overrides);

    let paths = SleuthPaths::new(config.storage.data_dir.clone());

    Ok(Settings {
        config,
        config_path: config_service.path().to_path_buf(),
        paths,
    })
}

fn apply_cli_overrides(config: &mut SleuthConfig, overrides: &Overrides) {
    if let Some(url) = &overrides.backend_url {
        config.backend.base_url = url.clone();
    }
    if let Some(dir) = &overrides.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }
}

/// Opens persistent storage, connects the backend client and hydrates the
/// investigation service.
pub async fn open_service(settings: &Settings) -> Result<InvestigationService> {
    let state_dir = settings.paths.state_dir()?;
    let storage = FileKeyValueStore::new(&state_dir)
        .await
        .with_context(|| format!("Failed to open state directory {}", state_dir.display()))?;

    let backend = HttpAnalysisBackend::from_config(&settings.config.backend)
        .context("Invalid backend configuration")?;

    tracing::info!(
        state_dir = %state_dir.display(),
        backend = %backend.base_url(),
        "[Bootstrap] Opening investigation service"
    );

    let service = InvestigationService::open(
        Arc::new(storage),
        Arc::new(backend),
        settings.config.polling.interval(),
    )
    .await
    .context("Failed to restore sessions")?;

    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_and_environment() {
        let mut config = SleuthConfig::default();
        config.backend.base_url = "http://from-env:9000".to_string();

        let overrides = Overrides {
            config: None,
            backend_url: Some("http://from-flag:7000".to_string()),
            data_dir: Some(PathBuf::from("/tmp/sleuth-flag")),
        };
        apply_cli_overrides(&mut config, &overrides);

        assert_eq!(config.backend.base_url, "http://from-flag:7000");
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/tmp/sleuth-flag")));
    }

    #[test]
    fn test_absent_flags_leave_config_untouched() {
        let mut config = SleuthConfig::default();
        config.storage.data_dir = Some(PathBuf::from("/data"));
        let before = config.clone();

        apply_cli_overrides(&mut config, &Overrides::default());
        assert_eq!(config, before);
    }
}
