//! Configuration check.

use super::CliError;
use erpsync_core::MappingConfig;
use erpsync_engine::SyncSettings;
use std::path::Path;
use tracing::info;

/// Runs the check-config command.
pub fn run(settings_path: &Path, mapping_path: Option<&Path>) -> Result<(), CliError> {
    let settings = SyncSettings::from_file(settings_path)?;
    info!(
        endpoint = %settings.endpoint(),
        database = %settings.database,
        mode = ?settings.mode,
        "settings ok"
    );
    println!(
        "Settings: {} ({:?}, auto-sync {})",
        settings.endpoint(),
        settings.mode,
        settings.auto_sync
    );

    if let Some(path) = mapping_path {
        let mapping = load_mapping(path)?;
        let kinds: Vec<&str> = mapping.kinds().collect();
        println!("Mapping:  {} kind(s): {}", kinds.len(), kinds.join(", "));
    }
    Ok(())
}

/// Reads, parses and validates a JSON mapping file.
pub fn load_mapping(path: &Path) -> Result<MappingConfig, CliError> {
    let json = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mapping = MappingConfig::from_json_str(&json)?;
    mapping.validate()?;
    Ok(mapping)
}
