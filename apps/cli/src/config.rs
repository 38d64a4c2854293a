use std::{collections::HashMap, fs};

/// Fixed collaborator endpoints and the deployed contract address, supplied
/// at build/deploy time rather than discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub node_url: String,
    pub wallet_url: String,
    pub contract_address: String,
    pub receipt_poll_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            node_url: "http://127.0.0.1:8545".into(),
            wallet_url: "http://127.0.0.1:8990".into(),
            contract_address: "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512".into(),
            receipt_poll_ms: 1500,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("dapp.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_overrides(&mut settings, &file_cfg);
        }
    }

    let mut env_cfg = HashMap::new();
    for key in ["node_url", "wallet_url", "contract_address", "receipt_poll_ms"] {
        let env_key = format!("DAPP__{}", key.to_ascii_uppercase());
        if let Ok(value) = std::env::var(env_key) {
            env_cfg.insert(key.to_string(), value);
        }
    }
    apply_overrides(&mut settings, &env_cfg);

    settings
}

fn apply_overrides(settings: &mut Settings, overrides: &HashMap<String, String>) {
    if let Some(v) = overrides.get("node_url") {
        settings.node_url = v.clone();
    }
    if let Some(v) = overrides.get("wallet_url") {
        settings.wallet_url = v.clone();
    }
    if let Some(v) = overrides.get("contract_address") {
        settings.contract_address = v.clone();
    }
    if let Some(v) = overrides.get("receipt_poll_ms") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.receipt_poll_ms = parsed;
        }
    }
}
