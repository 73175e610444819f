//! Command-line behavior of the `anonymiseur` binary.

mod common;

use anyhow::Result;
use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli() -> Result<Command> {
    let mut cmd = Command::cargo_bin("anonymiseur")?;
    cmd.env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn test_help_message() -> Result<()> {
    cli()?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--account-mask"))
        .stdout(predicate::str::contains("extract"))
        .stdout(predicate::str::contains("classify"));
    Ok(())
}

#[test]
fn test_ledger_is_written_to_output_dir() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("FEC2024.txt");
    std::fs::write(&input, LEDGER_EXPORT)?;
    let out = dir.path().join("out");

    cli()?
        .arg("-o")
        .arg(&out)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓"));

    let written = std::fs::read_to_string(out.join("anonymise_FEC2024.txt"))?;
    assert!(written.contains("4011XXXXXX"));
    assert_text_redacted(&written, &["DUPONT SARL", "MARTIN SAS"]);

    // Inputs are never modified.
    assert_eq!(std::fs::read_to_string(&input)?, LEDGER_EXPORT);
    Ok(())
}

#[test]
fn test_account_mask_flag() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("FEC.txt");
    std::fs::write(&input, LEDGER_EXPORT)?;

    cli()?
        .arg("--account-mask")
        .arg("full")
        .arg("-o")
        .arg(dir.path())
        .arg(&input)
        .assert()
        .success();

    let written = std::fs::read_to_string(dir.path().join("anonymise_FEC.txt"))?;
    assert!(written.contains("XXXXXXXXXX"));
    assert!(!written.contains("4011"));
    Ok(())
}

#[test]
fn test_unsupported_file_fails_without_stopping_batch() -> Result<()> {
    let dir = TempDir::new()?;
    let bad = dir.path().join("notes.odt");
    std::fs::write(&bad, b"not handled")?;
    let good = dir.path().join("DSN.dsn");
    std::fs::write(&good, DECLARATION)?;
    let out = dir.path().join("out");

    cli()?
        .arg("-o")
        .arg(&out)
        .arg(&bad)
        .arg(&good)
        .assert()
        .failure()
        .stdout(predicate::str::contains("✗"))
        .stdout(predicate::str::contains("format"));

    assert!(out.join("anonymise_DSN.dsn").exists());
    assert!(!out.join("anonymise_notes.odt").exists());
    Ok(())
}

#[test]
fn test_no_input_is_an_error() -> Result<()> {
    cli()?.assert().failure();
    Ok(())
}

#[test]
fn test_classify_subcommand() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("FEC.txt");
    std::fs::write(&input, LEDGER_EXPORT)?;

    cli()?
        .args(["classify", "-i"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Format: tabular ledger"))
        .stdout(predicate::str::contains("counter-pseudonym"));
    Ok(())
}

#[test]
fn test_extract_subcommand() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("DSN.dsn");
    std::fs::write(&input, DECLARATION)?;
    let output = dir.path().join("text.txt");

    cli()?
        .args(["extract", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted"));

    assert!(std::fs::read_to_string(&output)?.contains("S21.G00.30.002"));
    Ok(())
}

#[test]
fn test_missing_config_file_fails() -> Result<()> {
    let dir = TempDir::new()?;
    cli()?
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("FEC.txt")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
    Ok(())
}
