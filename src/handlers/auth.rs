use super::{RunContext, acquire_session, save_session};
use anyhow::Result;
use console::{Term, style};
use gorails_dl::AuthSession;
use std::process;

pub async fn handle_auth(ctx: &RunContext, session: Option<String>, forget: bool) -> Result<()> {
    let term = Term::stdout();

    if forget {
        if ctx.store.clear()? {
            term.write_line(&format!(
                "{} Removed saved session {}",
                style("🗑️").cyan(),
                style(ctx.store.path().display()).dim()
            ))?;
        } else {
            term.write_line(&format!("{} No saved session to remove", style("ℹ️").cyan()))?;
        }
        return Ok(());
    }

    let acquired = match session {
        Some(value) => {
            let session = AuthSession::new(value);
            save_session(ctx, &session)?;
            Some(session)
        }
        None => acquire_session(ctx).await?,
    };

    if acquired.is_some() {
        term.write_line(&format!(
            "{} Authentication successful, session saved to {}",
            style("✅").green(),
            style(ctx.store.path().display()).cyan()
        ))?;
    } else {
        term.write_line(&format!("{} Authentication failed!", style("❌").red()))?;
        process::exit(1);
    }

    Ok(())
}
