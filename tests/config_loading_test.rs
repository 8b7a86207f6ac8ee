use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use candy_mint::config::{Config, ENV_CANDY_MACHINE_ID, ENV_RPC_HOST, ENV_TX_TIMEOUT_MS};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_partial_file_falls_back_to_defaults() {
    let candy_machine = Pubkey::new_unique();
    let file = write_config(&format!(
        r#"
[rpc]
url = "https://api.mainnet-beta.solana.com"

[sale]
candy_machine_id = "{candy_machine}"
"#
    ));

    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.rpc.commitment, "confirmed");
    assert_eq!(config.confirmation.tx_timeout(), Duration::from_millis(30_000));
    assert_eq!(config.confirmation.poll_interval(), Duration::from_millis(2_000));
    assert!(config.confirmation.prefer_subscription);
    assert_eq!(config.candy_machine().unwrap(), Some(candy_machine));
    assert_eq!(
        config.rpc.websocket_url(),
        "wss://api.mainnet-beta.solana.com"
    );
    config.validate().unwrap();
}

#[test]
fn test_explicit_websocket_url_wins() {
    let file = write_config(
        r#"
[rpc]
url = "http://127.0.0.1:8899"
ws_url = "ws://127.0.0.1:8900"
commitment = "finalized"
"#,
    );

    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.rpc.websocket_url(), "ws://127.0.0.1:8900");
    assert_eq!(
        config.rpc.commitment_config().unwrap(),
        CommitmentConfig::finalized()
    );
}

#[test]
fn test_overrides_replace_file_values() {
    let candy_machine = Pubkey::new_unique().to_string();
    let vars: HashMap<&str, String> = [
        (ENV_CANDY_MACHINE_ID, candy_machine.clone()),
        (ENV_RPC_HOST, "http://localhost:8899".to_string()),
        (ENV_TX_TIMEOUT_MS, " 45000 ".to_string()),
    ]
    .into_iter()
    .collect();

    let mut config = Config::default();
    config
        .apply_overrides(|key| vars.get(key).cloned())
        .unwrap();

    assert_eq!(config.sale.candy_machine_id.as_deref(), Some(candy_machine.as_str()));
    assert_eq!(config.rpc.url, "http://localhost:8899");
    assert_eq!(config.rpc.websocket_url(), "ws://localhost:8899");
    assert_eq!(config.confirmation.tx_timeout_ms, 45_000);
}

#[test]
fn test_non_numeric_timeout_override_is_rejected() {
    let mut config = Config::default();
    let result = config.apply_overrides(|key| {
        (key == ENV_TX_TIMEOUT_MS).then(|| "soon".to_string())
    });
    assert!(result.is_err());
}

#[test]
fn test_validation_failures() {
    let mut config = Config::default();
    config.confirmation.tx_timeout_ms = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.confirmation.poll_interval_ms = config.confirmation.tx_timeout_ms;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.rpc.commitment = "eventually".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.sale.candy_machine_id = Some("not-base58!".to_string());
    assert!(config.validate().is_err());
    assert!(config.candy_machine().is_err());
}

#[test]
fn test_malformed_file_is_an_error() {
    let file = write_config("[confirmation]\ntx_timeout_ms = \"thirty\"\n");
    assert!(Config::from_file(file.path().to_str().unwrap()).is_err());
}

#[test]
fn test_start_date_is_exposed_as_utc() {
    let file = write_config("[sale]\nstart_date = 1640995200\n");
    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
    assert_eq!(
        config.sale.start_datetime().map(|dt| dt.to_rfc3339()),
        Some("2022-01-01T00:00:00+00:00".to_string())
    );
    assert!(Config::default().sale.start_datetime().is_none());
}
