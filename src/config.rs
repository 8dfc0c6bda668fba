use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::client::{
    DEFAULT_BASE_URL, DEFAULT_SESSION_COOKIE, DEFAULT_USER_AGENT, HttpSettings,
};
use crate::download::{DownloadOptions, MAX_PARALLEL_LIMIT};
use crate::session::SessionStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    /// 0 disables the stall check.
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Where the session token is kept; `~/.gorails.json` when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_output_dir() -> String {
    "downloads".to_string()
}
fn default_max_parallel() -> usize {
    10
}
fn default_retries() -> u32 {
    2
}
fn default_retry_delay_secs() -> u64 {
    2
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_session_cookie() -> String {
    DEFAULT_SESSION_COOKIE.to_string()
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_page_timeout_secs() -> u64 {
    60
}
fn default_stall_timeout_secs() -> u64 {
    120
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_parallel: default_max_parallel(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            session_cookie: default_session_cookie(),
            connect_timeout_secs: default_connect_timeout_secs(),
            page_timeout_secs: default_page_timeout_secs(),
            stall_timeout_secs: default_stall_timeout_secs(),
        }
    }
}

impl Config {
    /// Outbound connection settings for one run.
    pub fn http_settings(&self) -> Result<HttpSettings> {
        let network = &self.network;
        let base_url = Url::parse(&network.base_url)
            .with_context(|| format!("Invalid base_url: {}", network.base_url))?;

        let mut settings = HttpSettings::new(base_url);
        settings.user_agent = network.user_agent.clone();
        settings.session_cookie = network.session_cookie.clone();
        settings.connect_timeout = Duration::from_secs(network.connect_timeout_secs);
        settings.page_timeout = Duration::from_secs(network.page_timeout_secs);
        settings.stall_timeout = match network.stall_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Ok(settings)
    }

    /// Worker pool and retry settings, before CLI overrides.
    pub fn download_options(&self) -> DownloadOptions {
        DownloadOptions {
            output_directory: PathBuf::from(&self.general.output_dir),
            max_parallel: self.general.max_parallel,
            retries: self.general.retries,
            retry_delay: Duration::from_secs(self.general.retry_delay_secs),
        }
    }

    pub fn session_store(&self) -> Result<SessionStore> {
        match &self.session.file {
            Some(path) => Ok(SessionStore::at(path)),
            None => SessionStore::new().context("Failed to locate the session file"),
        }
    }
}

pub struct ConfigManager {
    config_dir: PathBuf,
    config_file: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load the config from the platform config directory, creating it with
    /// defaults on first run.
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("", "", "gorails-dl")
            .context("Failed to determine config directory")?;

        Self::with_file(project_dirs.config_dir().join("config.toml"))
    }

    /// Load the config from `config_file`, creating it with defaults when
    /// missing.
    pub fn with_file(config_file: impl Into<PathBuf>) -> Result<Self> {
        let config_file = config_file.into();
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
        }

        let config = if config_file.exists() {
            Self::load_config(&config_file)?
        } else {
            let default_config = Config::default();
            Self::save_config(&config_file, &default_config)?;
            default_config
        };

        Ok(Self {
            config_dir,
            config_file,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn save(&self) -> Result<()> {
        Self::save_config(&self.config_file, &self.config)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Overwrite the file with defaults.
    pub fn reset(&mut self) -> Result<()> {
        self.config = Config::default();
        self.save()
    }

    /// Current config as it would be written to disk.
    pub fn render(&self) -> Result<String> {
        toml::to_string_pretty(&self.config).context("Failed to serialize config")
    }

    fn load_config(config_file: &Path) -> Result<Config> {
        let content = fs::read_to_string(config_file)
            .with_context(|| format!("Failed to read config file: {:?}", config_file))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_file))?;

        Ok(config)
    }

    fn save_config(config_file: &Path, config: &Config) -> Result<()> {
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(config_file, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_file))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let general = &self.config.general;
        if general.max_parallel == 0 || general.max_parallel > MAX_PARALLEL_LIMIT {
            bail!(
                "max_parallel must be between 1 and {} (got {})",
                MAX_PARALLEL_LIMIT,
                general.max_parallel
            );
        }
        if general.output_dir.trim().is_empty() {
            bail!("output_dir cannot be empty");
        }

        let network = &self.config.network;
        if Url::parse(&network.base_url).is_err() {
            bail!("base_url is not a valid URL: {}", network.base_url);
        }
        if network.session_cookie.trim().is_empty() {
            bail!("session_cookie cannot be empty");
        }

        Ok(())
    }
}
