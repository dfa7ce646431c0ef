use super::*;

use std::time::{SystemTime, UNIX_EPOCH};

use shared::domain::TxHash;

#[test]
fn defaults_target_fuji() {
    let settings = Settings::default();
    assert_eq!(settings.chain_id, 43113);
    assert_eq!(settings.rpc_http_url, DEFAULT_RPC_HTTP_URL);
    assert!(settings.contract_address.is_empty());
}

#[test]
fn a_settings_file_overlays_the_defaults() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("orchestrator_settings_{suffix}.toml"));
    fs::write(
        &path,
        r#"
contract_address = "0x4242424242424242424242424242424242424242"
chain_id = 31337
rpc_http_url = "http://127.0.0.1:8545"
confirmation_timeout_secs = 10
"#,
    )
    .expect("write settings");

    let settings = load_settings_from(&path);
    assert_eq!(
        settings.contract_address,
        "0x4242424242424242424242424242424242424242"
    );
    assert_eq!(settings.chain_id, 31337);
    assert_eq!(settings.rpc_http_url, "http://127.0.0.1:8545");
    assert_eq!(settings.confirmation_timeout_secs, 10);
    // untouched keys keep their defaults
    assert_eq!(settings.receipt_poll_interval_ms, 2000);

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn an_unreadable_settings_file_is_ignored() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("orchestrator_settings_bad_{suffix}.toml"));
    fs::write(&path, "not [valid toml").expect("write settings");

    let settings = load_settings_from(&path);
    assert_eq!(settings.chain_id, DEFAULT_CHAIN_ID);

    fs::remove_file(path).expect("cleanup");
}

#[test]
fn a_missing_contract_address_is_a_startup_failure() {
    let err = Settings::default().into_config().expect_err("must fail");
    assert!(err.to_string().contains("contract address"));
}

#[test]
fn an_unparsable_contract_address_is_a_startup_failure() {
    let mut settings = Settings::default();
    settings.contract_address = "not-an-address".to_string();
    assert!(settings.into_config().is_err());
}

#[test]
fn the_websocket_url_is_derived_from_the_rpc_url() {
    let mut settings = Settings::default();
    settings.contract_address = "0x4242424242424242424242424242424242424242".to_string();
    let config = settings.into_config().expect("config");
    assert_eq!(config.rpc_ws_url.scheme(), "wss");
    assert_eq!(config.rpc_ws_url.host_str(), config.rpc_http_url.host_str());

    let mut settings = Settings::default();
    settings.contract_address = "0x4242424242424242424242424242424242424242".to_string();
    settings.rpc_http_url = "http://127.0.0.1:8545".to_string();
    let config = settings.into_config().expect("config");
    assert_eq!(config.rpc_ws_url.as_str(), "ws://127.0.0.1:8545/");
}

#[test]
fn an_explicit_websocket_url_wins() {
    let mut settings = Settings::default();
    settings.contract_address = "0x4242424242424242424242424242424242424242".to_string();
    settings.rpc_ws_url = Some("wss://example.org/ws".to_string());
    let config = settings.into_config().expect("config");
    assert_eq!(config.rpc_ws_url.as_str(), "wss://example.org/ws");
}

#[test]
fn explorer_links_point_at_the_transaction() {
    let mut settings = Settings::default();
    settings.contract_address = "0x4242424242424242424242424242424242424242".to_string();
    settings.explorer_base_url = "https://testnet.snowtrace.io/".to_string();
    let config = settings.into_config().expect("config");

    let hash = TxHash(alloy_primitives::B256::repeat_byte(0x11));
    assert_eq!(
        config.explorer_tx_url(hash),
        format!("https://testnet.snowtrace.io/tx/0x{}", "11".repeat(32))
    );
}

#[test]
fn zero_intervals_are_rejected() {
    let mut settings = Settings::default();
    settings.contract_address = "0x4242424242424242424242424242424242424242".to_string();
    settings.receipt_poll_interval_ms = 0;
    assert!(settings.into_config().is_err());
}
