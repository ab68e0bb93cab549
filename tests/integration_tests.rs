//! Integration tests for leadboard
//!
//! These drive the binary end to end against a SQLite store in a temp dir.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a leadboard Command isolated from the caller's env
fn leadboard(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("leadboard");
    cmd.current_dir(dir.path())
        .env_remove("LEADBOARD_API_URL")
        .env_remove("LEADBOARD_TOKEN")
        .env_remove("LEADBOARD_COMPANY_ID")
        .env_remove("LEADBOARD_EMPLOYEE_ID")
        .env_remove("RUST_LOG");
    cmd
}

fn init_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    leadboard(&dir).arg("init").assert().success();
    dir
}

fn add_lead(dir: &TempDir, name: &str) {
    leadboard(dir)
        .args(["add", "--name", name])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created lead"));
}

fn board_json(dir: &TempDir) -> serde_json::Value {
    let output = leadboard(dir).args(["board", "--json"]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Leads of the named stage column.
fn column(board: &serde_json::Value, stage: &str) -> Vec<serde_json::Value> {
    board
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["stage"]["name"] == stage)
        .map(|g| g["leads"].as_array().unwrap().clone())
        .unwrap_or_default()
}

fn only_lead_id(dir: &TempDir) -> String {
    let board = board_json(dir);
    column(&board, "New")[0]["leadId"].as_str().unwrap().to_string()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        let dir = TempDir::new().unwrap();
        leadboard(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("move"));
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        leadboard(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = TempDir::new().unwrap();
        leadboard(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Seeded 6 stages"));

        assert!(dir.path().join(".leadboard/leadboard.toml").exists());
        assert!(dir.path().join(".leadboard/leads.db").exists());
    }

    #[test]
    fn test_init_twice_keeps_stages() {
        let dir = init_project();
        leadboard(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already has 6 stages"));
    }

    #[test]
    fn test_commands_require_init() {
        let dir = TempDir::new().unwrap();
        leadboard(&dir)
            .arg("board")
            .assert()
            .failure()
            .stderr(predicate::str::contains("leadboard init"));
    }

    #[test]
    fn test_stages_lists_funnel() {
        let dir = init_project();
        leadboard(&dir)
            .arg("stages")
            .assert()
            .success()
            .stdout(predicate::str::contains("Qualified"))
            .stdout(predicate::str::contains("CONVERTED"))
            .stdout(predicate::str::contains("JUNK"));
    }
}

// =============================================================================
// Board and moves
// =============================================================================

mod board {
    use super::*;

    #[test]
    fn test_add_then_board() {
        let dir = init_project();
        add_lead(&dir, "Asha Rao");
        add_lead(&dir, "Vikram");

        leadboard(&dir)
            .arg("board")
            .assert()
            .success()
            .stdout(predicate::str::contains("Asha Rao"))
            .stdout(predicate::str::contains("2 leads"));

        let board = board_json(&dir);
        assert_eq!(board.as_array().unwrap().len(), 6);
        let new = column(&board, "New");
        assert_eq!(new.len(), 2);
        // Most recent first.
        assert_eq!(new[0]["name"], "Vikram");
    }

    #[test]
    fn test_add_to_unknown_stage_fails() {
        let dir = init_project();
        leadboard(&dir)
            .args(["add", "--name", "Asha", "--stage", "99"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Stage 99 not found"));
    }

    #[test]
    fn test_plain_move() {
        let dir = init_project();
        add_lead(&dir, "Asha");
        let id = only_lead_id(&dir);

        leadboard(&dir)
            .args(["move", &id, "2"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Lead updated successfully!"));

        let board = board_json(&dir);
        assert!(column(&board, "New").is_empty());
        assert_eq!(column(&board, "Contacted")[0]["leadId"], id.as_str());
    }

    #[test]
    fn test_same_stage_move_is_noop() {
        let dir = init_project();
        add_lead(&dir, "Asha");
        let id = only_lead_id(&dir);

        leadboard(&dir)
            .args(["move", &id, "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already in stage 1"));
    }

    #[test]
    fn test_move_unknown_lead_fails() {
        let dir = init_project();
        leadboard(&dir)
            .args(["move", "ghost", "2"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Lead ghost not found"));
    }

    #[test]
    fn test_move_to_text_stage_id_fails() {
        let dir = init_project();
        add_lead(&dir, "Asha");
        let id = only_lead_id(&dir);

        leadboard(&dir)
            .args(["move", &id, "PIPE001"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Stage PIPE001 not found"));
        assert_eq!(column(&board_json(&dir), "New").len(), 1);
    }

    #[test]
    fn test_convert_with_misplaced_comma_is_rejected() {
        let dir = init_project();
        add_lead(&dir, "Asha");
        let id = only_lead_id(&dir);

        leadboard(&dir)
            .args([
                "move",
                &id,
                "4",
                "--no-input",
                "--field",
                "finalQuotation=1,2,3",
                "--field",
                "signupAmount=1,00,000",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Misplaced digit separator"));
    }

    #[test]
    fn test_convert_with_fields() {
        let dir = init_project();
        add_lead(&dir, "Asha");
        let id = only_lead_id(&dir);

        leadboard(&dir)
            .args([
                "move",
                &id,
                "4",
                "--no-input",
                "--field",
                "finalQuotation=100000",
                "--field",
                "signupAmount=20,000",
                "--field",
                "paymentMode=UPI",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Convert lead"))
            .stdout(predicate::str::contains("Lead updated successfully!"));

        let board = board_json(&dir);
        let converted = column(&board, "Converted");
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0]["finalQuotation"], 100000.0);
        assert_eq!(converted[0]["signupAmount"], 20000.0);
        assert_eq!(converted[0]["paymentMode"], "UPI");
        assert!(column(&board, "New").is_empty());
    }

    #[test]
    fn test_convert_with_invalid_quotation_is_rejected() {
        let dir = init_project();
        add_lead(&dir, "Asha");
        let id = only_lead_id(&dir);

        leadboard(&dir)
            .args([
                "move",
                &id,
                "4",
                "--no-input",
                "--field",
                "finalQuotation=-5",
                "--field",
                "signupAmount=20000",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("finalQuotation"));

        let board = board_json(&dir);
        assert_eq!(column(&board, "New").len(), 1);
        assert!(column(&board, "Converted").is_empty());
    }

    #[test]
    fn test_lost_form_requires_reason() {
        let dir = init_project();
        add_lead(&dir, "Asha");
        let id = only_lead_id(&dir);

        leadboard(&dir)
            .args(["move", &id, "5", "--no-input"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Reason for lost is required"));

        leadboard(&dir)
            .args(["move", &id, "5", "--no-input", "--field", "reasonForLost=Budget"])
            .assert()
            .success();
        let board = board_json(&dir);
        assert_eq!(column(&board, "Lost")[0]["reasonForLost"], "Budget");
    }

    #[test]
    fn test_cancel_leaves_lead_in_place() {
        let dir = init_project();
        add_lead(&dir, "Asha");
        let id = only_lead_id(&dir);

        leadboard(&dir)
            .args(["move", &id, "6", "--cancel"])
            .assert()
            .success()
            .stdout(predicate::str::contains("was not moved"));

        let board = board_json(&dir);
        assert_eq!(column(&board, "New").len(), 1);
        assert!(column(&board, "Junk").is_empty());
    }

    #[test]
    fn test_malformed_field_fails() {
        let dir = init_project();
        leadboard(&dir)
            .args(["move", "x", "4", "--field", "finalQuotation"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("expected key=value"));
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_validate_defaults() {
        let dir = init_project();
        leadboard(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_config_validate_warns() {
        let dir = init_project();
        fs::write(
            dir.path().join(".leadboard/leadboard.toml"),
            "[backend]\ntimeout_secs = 0\n",
        )
        .unwrap();
        leadboard(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("timeout_secs"));
    }

    #[test]
    fn test_config_show_reports_company_override() {
        let dir = init_project();
        leadboard(&dir)
            .env("LEADBOARD_COMPANY_ID", "acme")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("company_id = \"acme\""));
    }

    #[test]
    fn test_company_from_config_is_isolated() {
        let dir = init_project();
        add_lead(&dir, "Asha");
        fs::write(
            dir.path().join(".leadboard/leadboard.toml"),
            "[session]\ncompany_id = \"globex\"\n",
        )
        .unwrap();

        leadboard(&dir)
            .arg("board")
            .assert()
            .success()
            .stdout(predicate::str::contains("No stages for company 'globex'"));
    }

    #[test]
    fn test_config_init_refuses_overwrite() {
        let dir = init_project();
        leadboard(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }
}
