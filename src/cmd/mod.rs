//! CLI command implementations.
//!
//! | Module   | Commands handled       |
//! |----------|------------------------|
//! | `init`   | `Init`                 |
//! | `board`  | `Stages`, `Board`      |
//! | `lead`   | `Add`, `Move`          |
//! | `serve`  | `Serve`                |
//! | `config` | `Config`               |

pub mod board;
pub mod config;
pub mod init;
pub mod lead;
pub mod serve;

pub use board::{cmd_board, cmd_stages};
pub use config::cmd_config;
pub use init::cmd_init;
pub use lead::{MoveArgs, cmd_add, cmd_move};
pub use serve::cmd_serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use leadboard::config::{BackendKind, LeadboardConfig};
use leadboard::store::{HttpStore, LeadStore, SqliteStore};

use super::Cli;

pub(crate) fn load_config(cli: &Cli, project_dir: &Path) -> Result<LeadboardConfig> {
    LeadboardConfig::with_cli_args(project_dir.to_path_buf(), cli.verbose, cli.backend)
}

/// Open the store the configuration points at.
pub(crate) fn open_store(config: &LeadboardConfig) -> Result<Arc<dyn LeadStore>> {
    match config.backend_kind() {
        BackendKind::Sqlite => {
            let db_path = config.db_path();
            if !db_path.exists() {
                anyhow::bail!(
                    "No lead database at {}. Run 'leadboard init' first.",
                    db_path.display()
                );
            }
            tracing::debug!(db = %db_path.display(), "Opening SQLite store");
            let store = SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open {}", db_path.display()))?;
            Ok(Arc::new(store))
        }
        BackendKind::Http => {
            let url = config.api_url();
            tracing::debug!(url = %url, "Using HTTP store");
            Ok(Arc::new(HttpStore::new(&url, config.timeout())?))
        }
    }
}
