use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;
use std::path::Path;

use super::OutputFormat;
use crate::config::Config;

const DEFAULT_CONFIG: &str = r#"# hydramap configuration

# Base URL of the Data API
api_url: http://localhost:8000

# Entity declarations, YAML or JSON (default: ~/.config/hydramap/entities.yaml)
# declarations: entities.yaml

# Access token, or set HYDRAMAP_TOKEN
# token: ...

# How the token is sent: bearer (Authorization: Bearer) or jwt (Auth: JWT)
# auth_scheme: bearer
"#;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("api_url: {}", config.api_url.value);
                        println!("  source: {}", config.api_url.source);
                        println!();

                        println!("declarations: {}", config.declarations.value.display());
                        println!("  source: {}", config.declarations.source);
                        println!();

                        match &config.token {
                            Some(token) => {
                                println!("token: (set)");
                                println!("  source: {}", token.source);
                            }
                            None => println!("token: (not set)"),
                        }
                        println!();

                        println!("auth_scheme: {}", config.auth_scheme.value);
                        println!("  source: {}", config.auth_scheme.source);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = config
                    .config_file
                    .clone()
                    .unwrap_or_else(Config::default_config_path);

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'hydramap config show' to view current configuration.");
                    return Ok(());
                }

                write_default_config(&config_path)?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

fn write_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(DEFAULT_CONFIG.as_bytes())
}
