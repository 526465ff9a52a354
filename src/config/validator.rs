use crate::config::{MapType, SupervisorConfig};
use crate::error::{Error, Result};

/// Validates the server identity and launch settings
pub fn validate_server_settings(config: &SupervisorConfig) -> Result<()> {
    if config.identity.trim().is_empty() {
        return Err(Error::ConfigInvalid("Server identity is empty".to_string()));
    }

    // The identity becomes a directory name under server/
    if config
        .identity
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
        || config.identity.contains("..")
    {
        return Err(Error::ConfigInvalid(format!(
            "Server identity '{}' is not a valid directory name",
            config.identity
        )));
    }

    if config.port == 0 {
        return Err(Error::ConfigInvalid("Server port must be non-zero".to_string()));
    }

    if config.max_players == 0 {
        return Err(Error::ConfigInvalid("Max players must be at least 1".to_string()));
    }

    if config.world_size == 0 {
        return Err(Error::ConfigInvalid("World size must be non-zero".to_string()));
    }

    if config.seed > i32::MAX as u32 {
        return Err(Error::ConfigInvalid(format!(
            "Seed {} exceeds {}",
            config.seed,
            i32::MAX
        )));
    }

    if config.map == MapType::Custom && config.map_url.trim().is_empty() {
        return Err(Error::ConfigInvalid(
            "Custom map selected but no map URL configured".to_string(),
        ));
    }

    if config.bind_address.trim().is_empty() {
        return Err(Error::ConfigInvalid("Bind address is empty".to_string()));
    }

    Ok(())
}

/// Validates the restart and crash-loop settings
pub fn validate_restart_settings(config: &SupervisorConfig) -> Result<()> {
    if config.max_fast_crashes == 0 {
        return Err(Error::ConfigInvalid(
            "Fast-crash threshold must be at least 1".to_string(),
        ));
    }

    if config.max_consecutive_failures == Some(0) {
        return Err(Error::ConfigInvalid(
            "Consecutive failure limit must be at least 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &SupervisorConfig) -> Result<()> {
    validate_server_settings(config)?;
    validate_restart_settings(config)?;

    if config.rcon_password.is_empty() || config.rcon_password == "changeme" {
        tracing::warn!("RCON password is unset or left at its default, change it before going public");
    }

    Ok(())
}
