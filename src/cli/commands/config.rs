use clap::Subcommand;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Print the effective configuration with secrets redacted")]
    Show,
}

pub async fn handle(cmd: ConfigCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let redacted = serde_json::to_value(config.redacted())?;
            match output_format {
                OutputFormat::Json => {
                    output_success(&output_format, "Configuration loaded", Some(redacted))?
                }
                OutputFormat::Text => println!("{}", serde_json::to_string_pretty(&redacted)?),
            }
            if let Err(e) = config.validate() {
                eprintln!("Warning: {}", e);
            }
            Ok(())
        }
    }
}
