//! Project setup command: `leadboard init`.

use std::path::Path;

use anyhow::{Context, Result};

use leadboard::config::{CONFIG_DIR, CONFIG_FILE, LeadboardToml};
use leadboard::store::sqlite::LeadDb;

use super::super::Cli;

pub fn cmd_init(cli: &Cli, project_dir: &Path) -> Result<()> {
    let leadboard_dir = project_dir.join(CONFIG_DIR);
    std::fs::create_dir_all(&leadboard_dir)
        .with_context(|| format!("Failed to create {}", leadboard_dir.display()))?;

    let config_path = leadboard_dir.join(CONFIG_FILE);
    if config_path.exists() {
        println!("Using existing {}", config_path.display());
    } else {
        LeadboardToml::default().save(&config_path)?;
        println!("Created {}", config_path.display());
    }

    let config = super::load_config(cli, project_dir)?;
    let db_path = config.db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = LeadDb::new(&db_path).context("Failed to initialize lead database")?;

    let company = config.company_id();
    let stages = db.list_stages(&company)?;
    if stages.is_empty() {
        let seeded = db.seed_default_stages(&company)?;
        println!(
            "Seeded {} stages for company '{}' in {}",
            seeded.len(),
            company,
            db_path.display()
        );
    } else {
        println!(
            "Company '{}' already has {} stages in {}",
            company,
            stages.len(),
            db_path.display()
        );
    }

    println!();
    println!("Next steps:");
    println!("  leadboard add --name \"First lead\"");
    println!("  leadboard board");
    Ok(())
}
