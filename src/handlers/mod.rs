pub mod all_series;
pub mod auth;
pub mod config;
pub mod info;
pub mod playlist;
pub mod video;

use crate::cli::{Cli, Commands, ConfigAction};
use anyhow::{Context, Result};
use console::{Term, style};
use dialoguer::{Input, Password, Select};
use gorails_dl::config::Config;
use gorails_dl::{
    AuthSession, Authenticator, DownloadOptions, HttpSettings, Orchestrator, ProgressBoard,
    SessionStore,
};
use std::sync::Arc;

// Re-export all handlers
pub use all_series::handle_all_series;
pub use auth::handle_auth;
pub use config::handle_config;
pub use info::handle_info;
pub use playlist::handle_playlist;
pub use video::handle_video;

/// Everything a command needs for one run: config values with the CLI
/// overrides applied.
pub struct RunContext {
    pub http: HttpSettings,
    pub options: DownloadOptions,
    pub store: SessionStore,
    pub force: bool,
}

impl RunContext {
    pub fn new(config: &Config, cli: &Cli) -> Result<Self> {
        let mut options = config.download_options();
        if let Some(output_dir) = &cli.output_dir {
            options.output_directory = output_dir.clone();
        }
        if let Some(max_parallel) = cli.max_parallel {
            options.max_parallel = max_parallel;
        }

        Ok(Self {
            http: config.http_settings()?,
            options,
            store: config.session_store()?,
            force: cli.force,
        })
    }

    /// Orchestrator drawing progress bars on the terminal.
    pub fn orchestrator(&self, session: AuthSession) -> Orchestrator {
        Orchestrator::new(self.http.clone(), Some(session), self.options.clone())
            .with_progress(Arc::new(ProgressBoard::new()))
    }
}

/// Check if config validation should be skipped for certain commands
pub fn should_skip_config_validation(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Info
            | Commands::Config {
                action: ConfigAction::Reset { .. } | ConfigAction::Path
            }
    )
}

/// Saved session if there is one, otherwise ask for one.
pub async fn ensure_session(ctx: &RunContext) -> Result<Option<AuthSession>> {
    if let Some(session) = ctx.store.load() {
        tracing::debug!(path = ?ctx.store.path(), "using saved session");
        return Ok(Some(session));
    }
    acquire_session(ctx).await
}

/// Interactive authentication menu. The chosen credential is saved on success.
pub async fn acquire_session(ctx: &RunContext) -> Result<Option<AuthSession>> {
    let term = Term::stdout();
    term.write_line(&format!(
        "{} {}",
        style("🔐").cyan(),
        style("GoRails authentication required").bold()
    ))?;

    let options = [
        "Email and Password - Login with your GoRails account",
        "Session Cookie - Provide _gorails_session cookie value",
        "Use Saved Session - Load previously saved session",
    ];

    loop {
        let choice = Select::new()
            .with_prompt("Choose authentication method")
            .items(&options)
            .default(0)
            .interact()?;

        match choice {
            0 => {
                let email: String = Input::new().with_prompt("Email").interact_text()?;
                let password = Password::new().with_prompt("Password").interact()?;

                let authenticator = Authenticator::new(Arc::new(ctx.http.clone()));
                return match authenticator.login(email.trim(), &password).await {
                    Ok(session) => {
                        save_session(ctx, &session)?;
                        Ok(Some(session))
                    }
                    Err(e) => {
                        term.write_line(&format!("{} Login failed: {}", style("❌").red(), e))?;
                        Ok(None)
                    }
                };
            }
            1 => {
                let value: String = Input::new()
                    .with_prompt("_gorails_session cookie value")
                    .interact_text()?;
                let session = AuthSession::new(value);
                if session.is_empty() {
                    term.write_line(&format!("{} Empty session value", style("❌").red()))?;
                    return Ok(None);
                }
                save_session(ctx, &session)?;
                return Ok(Some(session));
            }
            _ => match ctx.store.load() {
                Some(session) => {
                    term.write_line(&format!("{} Using saved session", style("✅").green()))?;
                    return Ok(Some(session));
                }
                None => {
                    term.write_line(&format!(
                        "{} No saved session found",
                        style("❌").red()
                    ))?;
                }
            },
        }
    }
}

pub fn save_session(ctx: &RunContext, session: &AuthSession) -> Result<()> {
    ctx.store
        .save(session)
        .with_context(|| format!("Failed to save session to {:?}", ctx.store.path()))
}

/// Like [`ensure_session`], but reports a missing session the way the
/// download commands do.
pub async fn require_session(ctx: &RunContext) -> Result<Option<AuthSession>> {
    let session = ensure_session(ctx).await?;
    if session.is_none() {
        Term::stderr().write_line(&format!(
            "{} Authentication required to download videos",
            style("❌").red()
        ))?;
    }
    Ok(session)
}
