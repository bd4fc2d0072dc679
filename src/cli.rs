use std::path::PathBuf;

use clap::Parser;

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "gphotos-upload",
    about = "Upload .jpg files in a directory and its subdirectories to Google Photos"
)]
pub struct Cli {
    /// Path to directory containing .jpg files
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Upload original resolution (counts against your storage quota)
    #[arg(long)]
    pub full_quality: bool,

    /// Directory for the credential cache (default: platform config dir)
    #[arg(long)]
    pub config_directory: Option<String>,

    /// OAuth client secrets JSON downloaded from the Google API console
    #[arg(long, env = "GPHOTOS_CLIENT_SECRETS")]
    pub client_secrets: Option<String>,

    /// Hostname the local authorization server listens on
    #[arg(long, default_value = "localhost")]
    pub auth_host_name: String,

    /// Port the local authorization server listens on
    #[arg(long, default_value_t = 8080)]
    pub auth_host_port: u16,

    /// Don't run a local web server; paste the authorization code instead
    #[arg(long)]
    pub noauth_local_webserver: bool,

    /// Root of the photo service data API
    #[arg(
        long,
        env = "GPHOTOS_SERVICE_URL",
        default_value = "https://picasaweb.google.com/data"
    )]
    pub service_url: String,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Disable progress spinner
    #[arg(long)]
    pub no_progress_bar: bool,
}
