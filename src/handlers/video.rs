use super::{RunContext, require_session};
use crate::cli::parse_http_url;
use anyhow::{Result, anyhow};
use console::{Term, style};
use gorails_dl::TransferStatus;
use gorails_dl::download::ProgressTracker;
use std::process;

pub async fn handle_video(ctx: &RunContext, url: String) -> Result<()> {
    let term = Term::stdout();
    let url = parse_http_url(&url).map_err(|e| anyhow!(e))?;

    term.write_line(&format!(
        "{} Downloading video {}{}",
        style("⬇️").cyan(),
        style(&url).cyan(),
        if ctx.force {
            style(" (forced)").yellow()
        } else {
            style("")
        }
    ))?;

    let Some(session) = require_session(ctx).await? else {
        process::exit(1);
    };

    match ctx.orchestrator(session).download_one(&url, ctx.force).await {
        Ok(outcome) => {
            let size = ProgressTracker::format_bytes(outcome.byte_size);
            match outcome.status {
                TransferStatus::Skipped => term.write_line(&format!(
                    "{} File already exists, skipped: {} ({})",
                    style("⏭️").yellow(),
                    style(&outcome.title).cyan(),
                    size
                ))?,
                TransferStatus::Resumed => term.write_line(&format!(
                    "{} Resumed and finished: {} ({})",
                    style("✅").green(),
                    style(&outcome.title).cyan(),
                    size
                ))?,
                _ => term.write_line(&format!(
                    "{} Successfully downloaded: {} ({})",
                    style("✅").green(),
                    style(&outcome.title).cyan(),
                    size
                ))?,
            }
            term.write_line(&format!(
                "   {}: {}",
                style("Saved to").dim(),
                outcome.local_path.display()
            ))?;
        }
        Err(e) => {
            term.write_line(&format!(
                "{} Failed to download video: {}",
                style("❌").red(),
                e
            ))?;
            process::exit(1);
        }
    }

    Ok(())
}
