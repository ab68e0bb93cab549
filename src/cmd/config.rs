//! Configuration view and validation commands: `leadboard config`.

use anyhow::Result;

use leadboard::config::{CONFIG_DIR, CONFIG_FILE, LeadboardConfig, LeadboardToml};

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    let leadboard_dir = project_dir.join(CONFIG_DIR);
    let config_path = leadboard_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Leadboard Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No leadboard.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            let toml = LeadboardToml::load_or_default(&leadboard_dir)?;
            print!("{}", toml::to_string_pretty(&toml)?);
            println!();

            println!("Effective values (with env/CLI overrides):");
            let config = LeadboardConfig::new(project_dir.to_path_buf())?;
            let session = config.session();
            println!("  backend = \"{}\"", config.backend_kind());
            println!("  api_url = \"{}\"", config.api_url());
            println!("  db_path = \"{}\"", config.db_path().display());
            println!("  company_id = \"{}\"", session.company_id);
            if let Some(ref employee) = session.employee_id {
                println!("  employee_id = \"{}\"", employee);
            }
            println!(
                "  token = {}",
                if session.token.is_some() { "(set)" } else { "(not set)" }
            );
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No leadboard.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = LeadboardToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("leadboard.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !leadboard_dir.exists() {
                std::fs::create_dir_all(&leadboard_dir)?;
            }

            LeadboardToml::default().save(&config_path)?;

            println!("Created leadboard.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [backend] kind, base_url, db_path");
            println!("  - [session] company_id, employee_id");
            println!("  - [forms] payment_modes, lost_reasons, junk_reasons");
            println!();
        }
    }

    Ok(())
}
