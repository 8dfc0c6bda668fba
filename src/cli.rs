use clap::{Parser, Subcommand};
use gorails_dl::download::MAX_PARALLEL_LIMIT;
use std::path::PathBuf;
use url::Url;


#[derive(Parser)]
#[command(name = "gorails-dl")]
#[command(about = "Download GoRails videos, playlists and whole series")]
#[command(long_about = "
gorails-dl downloads videos from GoRails using your account session. Downloads
resume where they stopped, files that are already complete are skipped, and
playlist episodes are fetched in parallel.

Examples:
  gorails-dl auth                                        # Sign in and save the session
  gorails-dl video https://gorails.com/episodes/intro-to-testing
  gorails-dl -j 4 playlist https://gorails.com/series/testing-rails
  gorails-dl -o ~/Videos/gorails all-series              # One directory per series
")]
#[command(version)]
pub struct Cli {
    /// Output directory for downloads
    #[arg(short, long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Force download and overwrite existing files
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Maximum parallel downloads within a playlist
    #[arg(short = 'j', long, global = true, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Override config file path
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a single video
    #[command(visible_alias = "v")]
    Video {
        /// Episode page URL
        url: String,
    },

    /// Download every episode of a playlist
    #[command(visible_alias = "p")]
    Playlist {
        /// Playlist (series) page URL
        url: String,
    },

    /// Download all series, each in its own directory
    AllSeries,

    /// Sign in and save the session
    Auth {
        /// Save this _gorails_session cookie value without prompting
        #[arg(short, long, value_name = "VALUE", conflicts_with = "forget")]
        session: Option<String>,

        /// Delete the saved session
        #[arg(long)]
        forget: bool,
    },

    /// Show information about the downloader
    Info,

    /// Manage configuration
    #[command(visible_alias = "cfg")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the config file location
    Path,

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

// Helper functions for CLI validation and parsing
impl Cli {
    /// Validate CLI arguments and show helpful error messages
    pub fn validate(&self) -> Result<(), String> {
        if let Some(max_parallel) = self.max_parallel {
            if max_parallel == 0 || max_parallel > MAX_PARALLEL_LIMIT {
                return Err(format!(
                    "Max parallel downloads must be between 1 and {}",
                    MAX_PARALLEL_LIMIT
                ));
            }
        }

        if let Some(output_dir) = &self.output_dir {
            if output_dir.as_os_str().is_empty() {
                return Err("Output directory cannot be empty".to_string());
            }
        }

        match &self.command {
            Commands::Video { url } | Commands::Playlist { url } => {
                parse_http_url(url)?;
            }
            Commands::Auth {
                session: Some(session),
                ..
            } => {
                if session.trim().is_empty() {
                    return Err("Session value cannot be empty".to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Check if command downloads and therefore needs a session
    pub fn requires_session(&self) -> bool {
        matches!(
            self.command,
            Commands::Video { .. } | Commands::Playlist { .. } | Commands::AllSeries
        )
    }
}

/// Parse an absolute http(s) URL.
pub fn parse_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("Invalid URL '{}': {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(format!(
            "Unsupported URL scheme '{}' in '{}', expected http or https",
            scheme, raw
        )),
    }
}
