use super::RunContext;
use anyhow::Result;
use console::{Term, style};

pub async fn handle_info(ctx: &RunContext) -> Result<()> {
    let term = Term::stdout();

    term.write_line(&format!(
        "{} {} {}",
        style("🎬").cyan(),
        style("GoRails Video Downloader").bold().blue(),
        style(env!("CARGO_PKG_VERSION")).dim()
    ))?;
    term.write_line(&format!(
        "{}",
        style("Download videos from the GoRails video series.").dim()
    ))?;

    term.write_line(&format!("\n{}", style("Usage:").bold()))?;
    for (command, description) in [
        ("video <URL>", "Download single video"),
        ("playlist <URL>", "Download playlist"),
        ("all-series", "Download all series"),
        ("auth", "Manage authentication"),
        ("config <show|path|reset>", "Manage configuration"),
        ("info", "Show this info"),
    ] {
        term.write_line(&format!(
            "  gorails-dl {} {}",
            style(format!("{:<26}", command)).cyan(),
            description
        ))?;
    }

    term.write_line(&format!("\n{}", style("Options:").bold()))?;
    for (flag, description) in [
        ("--force, -f", "Force download and overwrite existing files"),
        ("--output-dir, -o <DIR>", "Output directory for downloads"),
        ("--max-parallel, -j <N>", "Parallel downloads within a playlist"),
        ("--verbose, -v", "Enable verbose logging"),
        ("--config, -c <FILE>", "Use another config file"),
    ] {
        term.write_line(&format!(
            "  {} {}",
            style(format!("{:<26}", flag)).cyan(),
            description
        ))?;
    }

    term.write_line(&format!("\n{}", style("Current settings:").bold()))?;
    term.write_line(&format!(
        "  {}: {}",
        style("Output directory").dim(),
        ctx.options.output_directory.display()
    ))?;
    term.write_line(&format!(
        "  {}: {}",
        style("Max parallel").dim(),
        ctx.options.max_parallel
    ))?;
    term.write_line(&format!(
        "  {}: {}",
        style("Platform").dim(),
        ctx.http.base_url
    ))?;

    let session_state = if ctx.store.load().is_some() {
        style("saved").green()
    } else {
        style("none").yellow()
    };
    term.write_line(&format!(
        "  {}: {} ({})",
        style("Session").dim(),
        session_state,
        ctx.store.path().display()
    ))?;

    Ok(())
}
