//! Lead commands: `leadboard add`, `leadboard move`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use dialoguer::{Input, Select, theme::ColorfulTheme};

use leadboard::notify::ConsoleNotifier;
use leadboard::pipeline::forms::{CaptureForm, FieldKind, FormErrors, FormInput};
use leadboard::pipeline::models::{LeadId, NewLead, StageId};
use leadboard::pipeline::{Board, DragOutcome, IgnoreReason, SubmitOutcome};

use super::super::Cli;

pub struct MoveArgs {
    pub lead_id: LeadId,
    pub stage_id: StageId,
    /// Raw `key=value` pairs.
    pub fields: Vec<String>,
    pub no_input: bool,
    pub cancel: bool,
}

pub async fn cmd_add(cli: &Cli, project_dir: &Path, new: NewLead) -> Result<()> {
    if new.name.trim().is_empty() {
        anyhow::bail!("Lead name must not be empty");
    }
    let config = super::load_config(cli, project_dir)?;
    let store = super::open_store(&config)?;
    let session = config.session();

    let lead = store.create_lead(&session, new).await?;
    let stage_name = store
        .list_stages(&session)
        .await?
        .into_iter()
        .find(|s| s.id == lead.stage_id)
        .map(|s| s.name)
        .unwrap_or_else(|| lead.stage_id.to_string());

    println!(
        "{} Created lead {} ({}) in {}",
        console::style("✓").green().bold(),
        lead.lead_id,
        lead.name,
        stage_name
    );
    Ok(())
}

pub async fn cmd_move(cli: &Cli, project_dir: &Path, args: MoveArgs) -> Result<()> {
    let mut input = parse_fields(&args.fields)?;
    let config = super::load_config(cli, project_dir)?;
    let store = super::open_store(&config)?;
    let mut board = Board::new(store, Arc::new(ConsoleNotifier), config.session())
        .with_form_options(config.form_options().clone());
    board.refresh().await?;

    let form = match board.drag_end(&args.lead_id, args.stage_id.clone()).await {
        DragOutcome::Ignored(IgnoreReason::SameStage) => {
            println!("Lead {} is already in stage {}.", args.lead_id, args.stage_id);
            return Ok(());
        }
        DragOutcome::Ignored(IgnoreReason::UnknownLead) => {
            anyhow::bail!("Lead {} not found", args.lead_id)
        }
        DragOutcome::Ignored(reason) => {
            anyhow::bail!("Stage {} not found ({})", args.stage_id, reason.as_str())
        }
        DragOutcome::Moved(_) => return Ok(()),
        DragOutcome::Failed(e) => return Err(e.into()),
        DragOutcome::FormOpened(form) => form,
    };

    println!("{}", console::style(form.title).bold().cyan());
    if args.cancel {
        board.cancel();
        println!("Cancelled; lead {} was not moved.", args.lead_id);
        return Ok(());
    }

    let interactive = !args.no_input && console::Term::stdout().is_term();
    let mut rejected: Option<FormErrors> = None;
    loop {
        if interactive {
            prompt_fields(&form, &mut input, rejected.as_ref())?;
        }
        match board.submit(&input).await {
            SubmitOutcome::Committed(_) => return Ok(()),
            SubmitOutcome::Failed(e) => return Err(e.into()),
            SubmitOutcome::NoPendingForm => anyhow::bail!("No capture form is open"),
            SubmitOutcome::Invalid(errors) => {
                for (key, message) in errors.iter() {
                    eprintln!("  {} {}: {}", console::style("✗").red(), key, message);
                }
                if !interactive {
                    board.cancel();
                    anyhow::bail!("Capture form rejected: {}", errors);
                }
                rejected = Some(errors);
            }
        }
    }
}

/// Parse `key=value` pairs into form input. Later pairs win.
fn parse_fields(raw: &[String]) -> Result<FormInput> {
    let mut input = FormInput::new();
    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Invalid field '{}': expected key=value", pair))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Invalid field '{}': empty key", pair);
        }
        input.insert(key.to_string(), value.trim().to_string());
    }
    Ok(input)
}

/// Ask for every field not yet given, and again for every rejected one.
fn prompt_fields(
    form: &CaptureForm,
    input: &mut FormInput,
    rejected: Option<&FormErrors>,
) -> Result<()> {
    let theme = ColorfulTheme::default();
    for field in &form.fields {
        let needs_prompt = match rejected {
            Some(errors) => errors.get(field.key).is_some(),
            None => !input.contains_key(field.key),
        };
        if !needs_prompt {
            continue;
        }

        let label = if field.required {
            format!("{} *", field.label)
        } else {
            field.label.to_string()
        };
        let value = match field.kind {
            FieldKind::Choice { ref options } if !options.is_empty() => {
                let mut items: Vec<&str> = options.iter().map(String::as_str).collect();
                if !field.required {
                    items.insert(0, "(skip)");
                }
                let selection = Select::with_theme(&theme)
                    .with_prompt(&label)
                    .items(&items[..])
                    .default(0)
                    .interact()?;
                if field.required || selection > 0 {
                    items[selection].to_string()
                } else {
                    String::new()
                }
            }
            _ => Input::<String>::with_theme(&theme)
                .with_prompt(&label)
                .allow_empty(true)
                .interact_text()?,
        };

        if value.trim().is_empty() {
            input.remove(field.key);
        } else {
            input.insert(field.key.to_string(), value.trim().to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        let input = parse_fields(&[
            "finalQuotation=100000".to_string(),
            "paymentMode = UPI".to_string(),
            "projectTimeline=3 months, phase=1".to_string(),
        ])
        .unwrap();
        assert_eq!(input["finalQuotation"], "100000");
        assert_eq!(input["paymentMode"], "UPI");
        assert_eq!(input["projectTimeline"], "3 months, phase=1");
    }

    #[test]
    fn test_parse_fields_rejects_malformed() {
        assert!(parse_fields(&["finalQuotation".to_string()]).is_err());
        assert!(parse_fields(&["=5".to_string()]).is_err());
    }
}
