use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use leadboard::config::{BackendKind, CONFIG_DIR, LeadboardToml};
use leadboard::pipeline::StageId;

mod cmd;

#[derive(Parser)]
#[command(name = "leadboard")]
#[command(version, about = "Sales lead pipeline board")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Lead backend. Overrides backend.kind in leadboard.toml.
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .leadboard/ with a default config and seeded stages
    Init,
    /// List pipeline stages
    Stages,
    /// Show leads grouped by stage
    Board {
        /// Print the grouped board as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a lead
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        budget: Option<f64>,
        #[arg(long)]
        source: Option<String>,
        /// Stage id to start in (defaults to "New")
        #[arg(long)]
        stage: Option<StageId>,
    },
    /// Move a lead to another stage, filling in its capture form if needed
    Move {
        lead_id: String,
        stage_id: StageId,
        /// Capture form value as key=value (e.g. finalQuotation=100000)
        #[arg(short, long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
        /// Never prompt; fail if the form is incomplete
        #[arg(long)]
        no_input: bool,
        /// Discard the capture form instead of submitting it
        #[arg(long)]
        cancel: bool,
    },
    /// Run the lead API server
    Serve {
        /// Port to serve on (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable dev mode (permissive CORS, bind all interfaces)
        #[arg(long)]
        dev: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default leadboard.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // A broken config file is reported by the command that loads it.
    let logging = LeadboardToml::load_or_default(&project_dir.join(CONFIG_DIR))
        .map(|t| t.logging)
        .unwrap_or_default();
    leadboard::logging::init_tracing(&logging, cli.verbose)?;

    match &cli.command {
        Commands::Init => cmd::cmd_init(&cli, &project_dir)?,
        Commands::Stages => cmd::cmd_stages(&cli, &project_dir).await?,
        Commands::Board { json } => cmd::cmd_board(&cli, &project_dir, *json).await?,
        Commands::Add {
            name,
            phone,
            email,
            budget,
            source,
            stage,
        } => {
            let new = leadboard::pipeline::models::NewLead {
                name: name.clone(),
                stage_id: stage.clone(),
                phone: phone.clone(),
                email: email.clone(),
                budget: *budget,
                source: source.clone(),
                ..Default::default()
            };
            cmd::cmd_add(&cli, &project_dir, new).await?;
        }
        Commands::Move {
            lead_id,
            stage_id,
            fields,
            no_input,
            cancel,
        } => {
            cmd::cmd_move(
                &cli,
                &project_dir,
                cmd::MoveArgs {
                    lead_id: lead_id.as_str().into(),
                    stage_id: stage_id.clone(),
                    fields: fields.clone(),
                    no_input: *no_input,
                    cancel: *cancel,
                },
            )
            .await?;
        }
        Commands::Serve { port, dev } => cmd::cmd_serve(&cli, &project_dir, *port, *dev).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
