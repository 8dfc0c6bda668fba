use crate::cli::ConfigAction;
use anyhow::Result;
use console::{Term, style};
use dialoguer::Confirm;
use gorails_dl::config::ConfigManager;

pub async fn handle_config(config_manager: &mut ConfigManager, action: ConfigAction) -> Result<()> {
    let term = Term::stdout();

    match action {
        ConfigAction::Show => {
            term.write_line(&format!(
                "{} Current configuration ({}):",
                style("⚙️").cyan(),
                style(config_manager.config_file().display()).dim()
            ))?;
            term.write_line("")?;
            term.write_line(&config_manager.render()?)?;

            if let Err(e) = config_manager.validate() {
                term.write_line(&format!("{} {}", style("⚠️").yellow(), e))?;
            }
        }

        ConfigAction::Path => {
            term.write_line(&config_manager.config_file().display().to_string())?;
        }

        ConfigAction::Reset { yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt("Are you sure you want to reset all configuration?")
                    .default(false)
                    .interact()?;

                if !confirmed {
                    term.write_line(&format!("{} Operation cancelled", style("❌").red()))?;
                    return Ok(());
                }
            }

            config_manager.reset()?;
            term.write_line(&format!(
                "{} Configuration reset to defaults",
                style("✅").green()
            ))?;
        }
    }

    Ok(())
}
