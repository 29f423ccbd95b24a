// ABOUTME: Session options resolution for the cowork CLI
// ABOUTME: Merges the TOML config file with command-line flags and COWORK_* env vars

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use cowork_session::Options;

/// Connection parameters given on the command line.
#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Path to a session config file (defaults to ~/.config/cowork/session.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Client name reported to the workspace
    #[arg(long, global = true, env = "COWORK_CLIENT_NAME")]
    pub client_name: Option<String>,

    /// Workspace session id
    #[arg(long, global = true, env = "COWORK_SESSION_ID")]
    pub session_id: Option<String>,

    /// Token for the SSH session and internal server
    #[arg(long, global = true, env = "COWORK_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// Relay shared-access signature
    #[arg(long, global = true, env = "COWORK_RELAY_SAS", hide_env_values = true)]
    pub relay_sas: Option<String>,

    /// Relay endpoint (sb://... or http://...)
    #[arg(long, global = true, env = "COWORK_RELAY_ENDPOINT")]
    pub relay_endpoint: Option<String>,

    /// Accepted host public key (base64 or OpenSSH line); repeatable
    #[arg(long = "host-key", global = true)]
    pub host_keys: Vec<String>,
}

/// Returns the config directory path (~/.config/cowork)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("cowork"))
}

/// Returns the path to the default session config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("session.toml"))
}

impl SessionArgs {
    /// Build options from the config file, then apply flags on top.
    ///
    /// An explicit `--config` must exist; the default file is optional.
    pub fn resolve(&self) -> Result<Options> {
        let mut opts = match &self.config {
            Some(path) => Options::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => match default_config_path() {
                Ok(path) if path.exists() => Options::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                _ => Options::default(),
            },
        };

        if let Some(v) = &self.client_name {
            opts.client_name = v.clone();
        }
        if let Some(v) = &self.session_id {
            opts.session_id = v.clone();
        }
        if let Some(v) = &self.session_token {
            opts.session_token = v.clone();
        }
        if let Some(v) = &self.relay_sas {
            opts.relay_sas = v.clone();
        }
        if let Some(v) = &self.relay_endpoint {
            opts.relay_endpoint = v.clone();
        }
        if !self.host_keys.is_empty() {
            opts.host_public_keys = self.host_keys.clone();
        }
        Ok(opts)
    }
}
