use super::playlist::print_playlist_result;
use super::{RunContext, require_session};
use anyhow::Result;
use console::{Term, style};
use std::process;

pub async fn handle_all_series(ctx: &RunContext) -> Result<()> {
    let term = Term::stdout();
    term.write_line(&format!(
        "{} Downloading all series into {}",
        style("📚").cyan(),
        style(ctx.options.output_directory.display()).cyan()
    ))?;

    let Some(session) = require_session(ctx).await? else {
        process::exit(1);
    };

    let summary = match ctx.orchestrator(session).download_all_series(ctx.force).await {
        Ok(summary) => summary,
        Err(e) => {
            term.write_line(&format!(
                "{} Failed to download series: {}",
                style("❌").red(),
                e
            ))?;
            process::exit(1);
        }
    };

    for series in &summary.series {
        term.write_line(&format!(
            "\n{} {} ({})",
            style("📁").cyan(),
            style(&series.entry.title).bold(),
            series.entry.directory_slug
        ))?;
        print_playlist_result(&term, &series.result)?;
    }

    for failure in &summary.failures {
        term.write_line(&format!(
            "{} {}: {}",
            style("❌").red(),
            style(&failure.entry.title).bold(),
            failure.reason
        ))?;
    }

    term.write_line("")?;
    term.write_line(&format!(
        "{} Downloaded {}/{} series: {} episodes downloaded, {} skipped, {} failed",
        style("✅").green(),
        summary.completed_series(),
        summary.total_series,
        summary.downloaded(),
        summary.skipped(),
        summary.failed_episodes()
    ))?;

    if summary.has_failures() {
        process::exit(1);
    }
    Ok(())
}
