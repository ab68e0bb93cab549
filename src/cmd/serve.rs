//! Lead API server command: `leadboard serve`.

use std::path::Path;

use anyhow::Result;

use leadboard::server::{ServerConfig, start_server};

use super::super::Cli;

pub async fn cmd_serve(cli: &Cli, project_dir: &Path, port: Option<u16>, dev: bool) -> Result<()> {
    let config = super::load_config(cli, project_dir)?;
    start_server(ServerConfig {
        port: port.unwrap_or_else(|| config.server_port()),
        db_path: config.db_path(),
        dev_mode: dev,
        seed_company: config.company_id(),
    })
    .await
}
