//! Read-only board views: `leadboard stages`, `leadboard board`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use leadboard::notify::RecordingNotifier;
use leadboard::pipeline::models::{FormType, Lead};
use leadboard::pipeline::Board;

use super::super::Cli;

pub async fn cmd_stages(cli: &Cli, project_dir: &Path) -> Result<()> {
    let config = super::load_config(cli, project_dir)?;
    let store = super::open_store(&config)?;
    let stages = store.list_stages(&config.session()).await?;

    if stages.is_empty() {
        println!("No stages for company '{}'.", config.company_id());
        return Ok(());
    }

    println!("{}", console::style("Stages").bold().cyan());
    for stage in &stages {
        let form = match stage.form_type {
            FormType::None => console::style("-".to_string()).dim(),
            other => console::style(other.to_string()).yellow(),
        };
        println!("  {:>4}  {:<16} {}", stage.id, stage.name, form);
    }
    Ok(())
}

pub async fn cmd_board(cli: &Cli, project_dir: &Path, json: bool) -> Result<()> {
    let config = super::load_config(cli, project_dir)?;
    let store = super::open_store(&config)?;
    let mut board = Board::new(store, Arc::new(RecordingNotifier::new()), config.session());
    board.refresh().await?;

    let mut groups = board.groups();
    groups.sort_recent_first();

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("No stages for company '{}'. Run 'leadboard init'.", config.company_id());
        return Ok(());
    }

    for group in groups.iter() {
        println!(
            "{} {}",
            console::style(&group.stage.name).bold().cyan(),
            console::style(format!("({})", group.leads.len())).dim()
        );
        if group.leads.is_empty() {
            println!("  {}", console::style("empty").dim());
        }
        for lead in &group.leads {
            println!("  {}", lead_line(lead));
        }
        println!();
    }
    println!("{} leads", groups.total_leads());
    Ok(())
}

fn lead_line(lead: &Lead) -> String {
    let mut line = format!("{}  {}", lead.lead_id, lead.name);
    if let Some(ref phone) = lead.phone {
        line.push_str(&format!("  {}", phone));
    }
    if let Some(amount) = lead.capture.final_quotation {
        line.push_str(&format!("  quote {}", amount));
    }
    if let Some(ref reason) = lead.capture.reason_for_lost {
        line.push_str(&format!("  lost: {}", reason));
    }
    if let Some(ref reason) = lead.capture.reason_for_junk {
        line.push_str(&format!("  junk: {}", reason));
    }
    line
}
