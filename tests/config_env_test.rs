//! Configuration from the process environment
//!
//! These tests mutate process-wide environment variables and therefore run serially.

use anyhow::Result;
use cellwire::config::{MAX_FRAME_LEN_VAR, READER_PIPE_VAR, WRITER_PIPE_VAR};
use cellwire::{Comms, CommsConfig, CommsError, ConfigError};
use serial_test::serial;
use std::env;

fn clear_vars() {
    for name in [WRITER_PIPE_VAR, READER_PIPE_VAR, MAX_FRAME_LEN_VAR] {
        env::remove_var(name);
    }
}

#[test]
#[serial]
fn test_from_env_reads_paths() -> Result<()> {
    clear_vars();
    env::set_var(WRITER_PIPE_VAR, "/run/cell/out");
    env::set_var(READER_PIPE_VAR, "/run/cell/in");
    env::set_var(MAX_FRAME_LEN_VAR, "2048");

    let config = CommsConfig::from_env()?;
    assert_eq!(config.writer_path.to_str(), Some("/run/cell/out"));
    assert_eq!(config.reader_path.to_str(), Some("/run/cell/in"));
    assert_eq!(config.max_frame_len, 2048);

    clear_vars();
    Ok(())
}

#[test]
#[serial]
fn test_from_env_missing_reader() {
    clear_vars();
    env::set_var(WRITER_PIPE_VAR, "/run/cell/out");

    assert_eq!(
        CommsConfig::from_env(),
        Err(ConfigError::MissingVar(READER_PIPE_VAR))
    );
    assert!(matches!(
        Comms::from_env(),
        Err(CommsError::Config(ConfigError::MissingVar(READER_PIPE_VAR)))
    ));

    clear_vars();
}

#[tokio::test]
#[serial]
async fn test_comms_from_env_opens_lazily() -> Result<()> {
    clear_vars();
    let dir = tempfile::tempdir()?;
    let writer_path = dir.path().join("to_peer");
    let reader_path = dir.path().join("from_peer");
    env::set_var(WRITER_PIPE_VAR, &writer_path);
    env::set_var(READER_PIPE_VAR, &reader_path);

    // Nothing exists yet, but construction does not touch the pipes
    let comms = Comms::from_env()?;
    assert!(comms.error().is_none());
    assert!(!comms.transport().is_open());

    std::fs::write(&writer_path, b"")?;
    std::fs::write(&reader_path, b"")?;
    comms.send("/late", 1i64).await?;
    assert!(comms.transport().is_open());

    clear_vars();
    Ok(())
}
