use std::{env, fs, path::Path, time::Duration};

use alloy_primitives::Address;
use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

use shared::domain::{ChainId, TxHash};

/// Avalanche Fuji C-Chain, the only network the orchestrator contract is
/// deployed on.
pub const DEFAULT_CHAIN_ID: u64 = 43113;

const DEFAULT_RPC_HTTP_URL: &str = "https://api.avax-test.network/ext/bc/C/rpc";
const DEFAULT_EXPLORER_BASE_URL: &str = "https://testnet.snowtrace.io";
const SETTINGS_FILE: &str = "orchestrator.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub contract_address: String,
    pub chain_id: u64,
    pub rpc_http_url: String,
    pub rpc_ws_url: Option<String>,
    pub confirmation_timeout_secs: u64,
    pub receipt_poll_interval_ms: u64,
    pub analyzing_notice_interval_secs: u64,
    pub explorer_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            contract_address: String::new(),
            chain_id: DEFAULT_CHAIN_ID,
            rpc_http_url: DEFAULT_RPC_HTTP_URL.into(),
            rpc_ws_url: None,
            confirmation_timeout_secs: 180,
            receipt_poll_interval_ms: 2000,
            analyzing_notice_interval_secs: 30,
            explorer_base_url: DEFAULT_EXPLORER_BASE_URL.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    contract_address: Option<String>,
    chain_id: Option<u64>,
    rpc_http_url: Option<String>,
    rpc_ws_url: Option<String>,
    confirmation_timeout_secs: Option<u64>,
    receipt_poll_interval_ms: Option<u64>,
    analyzing_notice_interval_secs: Option<u64>,
    explorer_base_url: Option<String>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE))
}

pub fn load_settings_from(path: &Path) -> Settings {
    let mut settings = Settings::default();
    apply_file(&mut settings, path);
    apply_env(&mut settings);
    settings
}

fn apply_file(settings: &mut Settings, path: &Path) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    let file = match toml::from_str::<FileSettings>(&raw) {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable settings file");
            return;
        }
    };
    if let Some(v) = file.contract_address {
        settings.contract_address = v;
    }
    if let Some(v) = file.chain_id {
        settings.chain_id = v;
    }
    if let Some(v) = file.rpc_http_url {
        settings.rpc_http_url = v;
    }
    if let Some(v) = file.rpc_ws_url {
        settings.rpc_ws_url = Some(v);
    }
    if let Some(v) = file.confirmation_timeout_secs {
        settings.confirmation_timeout_secs = v;
    }
    if let Some(v) = file.receipt_poll_interval_ms {
        settings.receipt_poll_interval_ms = v;
    }
    if let Some(v) = file.analyzing_notice_interval_secs {
        settings.analyzing_notice_interval_secs = v;
    }
    if let Some(v) = file.explorer_base_url {
        settings.explorer_base_url = v;
    }
}

fn apply_env(settings: &mut Settings) {
    if let Ok(v) = env::var("ORCHESTRATOR_CONTRACT_ADDRESS") {
        settings.contract_address = v;
    }
    if let Ok(v) = env::var("ORCHESTRATOR_CHAIN_ID") {
        match v.parse() {
            Ok(parsed) => settings.chain_id = parsed,
            Err(_) => warn!(value = %v, "ignoring non-numeric ORCHESTRATOR_CHAIN_ID"),
        }
    }
    if let Ok(v) = env::var("ORCHESTRATOR_RPC_HTTP_URL") {
        settings.rpc_http_url = v;
    }
    if let Ok(v) = env::var("ORCHESTRATOR_RPC_WS_URL") {
        settings.rpc_ws_url = Some(v);
    }
    if let Ok(v) = env::var("ORCHESTRATOR_CONFIRMATION_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse() {
            settings.confirmation_timeout_secs = parsed;
        }
    }
    if let Ok(v) = env::var("ORCHESTRATOR_EXPLORER_BASE_URL") {
        settings.explorer_base_url = v;
    }
}

/// Validated, typed configuration. Produced once at startup; a missing or
/// unparsable contract address is a hard failure here, never a runtime
/// retry.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub contract_address: Address,
    pub required_chain: ChainId,
    pub rpc_http_url: Url,
    pub rpc_ws_url: Url,
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub analyzing_notice_interval: Duration,
    pub explorer_base_url: String,
}

impl OrchestratorConfig {
    pub fn explorer_tx_url(&self, hash: TxHash) -> String {
        format!("{}/tx/{hash}", self.explorer_base_url.trim_end_matches('/'))
    }
}

impl Settings {
    pub fn into_config(self) -> anyhow::Result<OrchestratorConfig> {
        if self.contract_address.trim().is_empty() {
            bail!(
                "contract address is not configured; set contract_address in \
                 {SETTINGS_FILE} or ORCHESTRATOR_CONTRACT_ADDRESS"
            );
        }
        let contract_address: Address = self
            .contract_address
            .trim()
            .parse()
            .with_context(|| format!("invalid contract address {:?}", self.contract_address))?;

        let rpc_http_url = Url::parse(&self.rpc_http_url)
            .with_context(|| format!("invalid rpc url {:?}", self.rpc_http_url))?;
        let rpc_ws_url = match &self.rpc_ws_url {
            Some(raw) => Url::parse(raw).with_context(|| format!("invalid websocket url {raw:?}"))?,
            None => derive_ws_url(&rpc_http_url)?,
        };

        if self.receipt_poll_interval_ms == 0 {
            bail!("receipt_poll_interval_ms must be positive");
        }
        if self.analyzing_notice_interval_secs == 0 {
            bail!("analyzing_notice_interval_secs must be positive");
        }

        Ok(OrchestratorConfig {
            contract_address,
            required_chain: ChainId(self.chain_id),
            rpc_http_url,
            rpc_ws_url,
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            receipt_poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
            analyzing_notice_interval: Duration::from_secs(self.analyzing_notice_interval_secs),
            explorer_base_url: self.explorer_base_url,
        })
    }
}

fn derive_ws_url(http: &Url) -> anyhow::Result<Url> {
    let scheme = match http.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => bail!("cannot derive a websocket url from scheme {other:?}"),
    };
    let mut ws = http.clone();
    ws.set_scheme(scheme)
        .map_err(|()| anyhow!("cannot set websocket scheme on {http}"))?;
    Ok(ws)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
