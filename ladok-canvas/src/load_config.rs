/// `load_config` module: reads the JSON configuration file and fills in the Ladok password.
///
/// The file holds the Canvas host and access token and the Ladok username. The Ladok
/// password may be left out of the file; it is then taken from `LADOK_PASSWORD`
/// (a `.env` file is loaded by `main`), and as a last resort asked for on the terminal.
///
/// # Errors
/// All errors use `anyhow::Error` with the file name in the message and are surfaced at the
/// CLI boundary.
use anyhow::{Context, Result};
use dialoguer::Password;
use ladok_canvas_core::config::Config;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const PASSWORD_ENV: &str = "LADOK_PASSWORD";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}. Create one (the default name is config.json)",
                path_ref,
                e
            ));
        }
    };

    let mut config: Config = match serde_json::from_str(&config_content) {
        Ok(conf) => conf,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config JSON");
            return Err(anyhow::anyhow!(
                "Failed to parse config JSON in {:?}: {e}",
                path_ref
            ));
        }
    };

    if config.ladok.password.is_none() {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            info!(env = PASSWORD_ENV, "Using Ladok password from environment");
            config.ladok.password = Some(password);
        }
    }

    config.trace_loaded();
    Ok(config)
}

/// The Ladok password from the config, or prompted for when the config has none.
pub fn ladok_password(config: &Config) -> Result<String> {
    if let Some(password) = &config.ladok.password {
        return Ok(password.clone());
    }
    Password::new()
        .with_prompt(format!("Ladok password for {}", config.ladok.username))
        .interact()
        .context("Failed to read Ladok password from the terminal")
}
