use std::path::PathBuf;

use crate::auth::{default_client_secrets, AuthConfig};
use crate::types::LogLevel;

/// Application name used for the per-user config directory.
const APP_DIR_NAME: &str = "gphotos-upload";

/// Application configuration resolved from the command line.
pub struct Config {
    pub directory: PathBuf,
    pub config_directory: PathBuf,
    pub client_secrets: PathBuf,
    pub service_url: String,
    pub auth_host_name: String,

    pub auth_host_port: u16,

    pub log_level: LogLevel,

    pub full_quality: bool,
    pub noauth_local_webserver: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("directory", &self.directory)
            .field("full_quality", &self.full_quality)
            .field("config_directory", &self.config_directory)
            .field("service_url", &self.service_url)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// `~/.config/gphotos-upload` on Linux, the platform equivalent elsewhere.
fn default_config_directory() -> anyhow::Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| {
            anyhow::anyhow!("Cannot determine a config directory; pass --config-directory")
        })
}

impl Config {
    pub fn from_cli(cli: crate::cli::Cli) -> anyhow::Result<Self> {
        let directory = match cli.path.to_str() {
            Some(s) => expand_tilde(s),
            None => cli.path,
        };

        let config_directory = match cli.config_directory.as_deref() {
            Some(dir) => expand_tilde(dir),
            None => default_config_directory()?,
        };

        let client_secrets = cli
            .client_secrets
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| default_client_secrets(&config_directory));

        let service_url = cli.service_url.trim_end_matches('/').to_string();
        if service_url.is_empty() {
            anyhow::bail!("--service-url must not be empty");
        }

        Ok(Self {
            directory,
            config_directory,
            client_secrets,
            service_url,
            auth_host_name: cli.auth_host_name,
            auth_host_port: cli.auth_host_port,
            log_level: cli.log_level,
            full_quality: cli.full_quality,
            noauth_local_webserver: cli.noauth_local_webserver,
            no_progress_bar: cli.no_progress_bar,
        })
    }

    /// Subset consumed by the credential provider.
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            config_directory: self.config_directory.clone(),
            client_secrets: self.client_secrets.clone(),
            host_name: self.auth_host_name.clone(),
            port: self.auth_host_port,
            local_webserver: !self.noauth_local_webserver,
        }
    }
}
