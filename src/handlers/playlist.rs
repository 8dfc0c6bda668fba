use super::{RunContext, require_session};
use crate::cli::parse_http_url;
use anyhow::{Result, anyhow};
use console::{Term, style};
use gorails_dl::PlaylistResult;
use gorails_dl::download::ProgressTracker;
use std::process;

pub async fn handle_playlist(ctx: &RunContext, url: String) -> Result<()> {
    let term = Term::stdout();
    let url = parse_http_url(&url).map_err(|e| anyhow!(e))?;

    term.write_line(&format!(
        "{} Downloading playlist {} ({} parallel)",
        style("📼").cyan(),
        style(&url).cyan(),
        ctx.options.max_parallel
    ))?;

    let Some(session) = require_session(ctx).await? else {
        process::exit(1);
    };

    match ctx.orchestrator(session).download_playlist(&url, ctx.force).await {
        Ok(result) => {
            print_playlist_result(&term, &result)?;
            if result.failed() > 0 {
                process::exit(1);
            }
        }
        Err(e) => {
            term.write_line(&format!(
                "{} Failed to download playlist: {}",
                style("❌").red(),
                e
            ))?;
            process::exit(1);
        }
    }

    Ok(())
}

pub(crate) fn print_playlist_result(term: &Term, result: &PlaylistResult) -> Result<()> {
    for video in result.videos.iter().filter(|v| v.is_failed()) {
        term.write_line(&format!(
            "   {} #{}: {}",
            style("✗").red(),
            video.ordinal_position.unwrap_or_default(),
            video.status
        ))?;
    }

    let icon = if result.failed() == 0 {
        style("✅").green()
    } else {
        style("⚠️").yellow()
    };
    term.write_line(&format!(
        "{} Playlist done: {}/{} episodes downloaded, {} skipped, {} failed ({})",
        icon,
        result.downloaded(),
        result.total(),
        result.skipped(),
        result.failed(),
        ProgressTracker::format_bytes(result.total_bytes())
    ))?;
    Ok(())
}
