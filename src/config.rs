//! Configuration management for the admission pipeline

use crate::coins::{parse_dec_coins, DecCoin};
use crate::error::ConfigError;
use crate::keepers::{AuthParams, GlobalFeeParams};
use crate::stages::{FloorActivation, VotePolicy};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdmissionConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub fees: FeesConfig,
    #[serde(default)]
    pub governance: GovernanceConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
    /// Block gas ceiling; unset means unlimited.
    #[serde(default)]
    pub max_block_gas: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            max_block_gas: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_max_memo_characters")]
    pub max_memo_characters: u64,
    #[serde(default = "default_tx_sig_limit")]
    pub tx_sig_limit: u64,
    #[serde(default = "default_tx_size_cost_per_byte")]
    pub tx_size_cost_per_byte: u64,
    #[serde(default = "default_sig_verify_cost_ed25519")]
    pub sig_verify_cost_ed25519: u64,
    #[serde(default = "default_sig_verify_cost_secp256k1")]
    pub sig_verify_cost_secp256k1: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_memo_characters: default_max_memo_characters(),
            tx_sig_limit: default_tx_sig_limit(),
            tx_size_cost_per_byte: default_tx_size_cost_per_byte(),
            sig_verify_cost_ed25519: default_sig_verify_cost_ed25519(),
            sig_verify_cost_secp256k1: default_sig_verify_cost_secp256k1(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeesConfig {
    /// Node-local prices, e.g. `"0.0025uatone"`. Checked in mempool admission only.
    #[serde(default)]
    pub min_gas_prices: String,
    /// Governance floor; empty means no floor.
    #[serde(default)]
    pub minimum_gas_prices: String,
    #[serde(default = "default_bypass_msg_types")]
    pub bypass_min_fee_msg_types: Vec<String>,
    #[serde(default = "default_max_bypass_gas")]
    pub max_total_bypass_min_fee_msg_gas_usage: u64,
    /// Lift the floor while total bonded tokens are below this amount.
    #[serde(default)]
    pub floor_min_bonded_tokens: Option<u128>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub vote_policy: VotePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_chain_id() -> String {
    "atomone-devnet-1".to_string()
}

fn default_max_memo_characters() -> u64 {
    256
}

fn default_tx_sig_limit() -> u64 {
    7
}

fn default_tx_size_cost_per_byte() -> u64 {
    10
}

fn default_sig_verify_cost_ed25519() -> u64 {
    590
}

fn default_sig_verify_cost_secp256k1() -> u64 {
    1000
}

fn default_bypass_msg_types() -> Vec<String> {
    vec![
        "/ibc.core.channel.v1.MsgRecvPacket".to_string(),
        "/ibc.core.channel.v1.MsgAcknowledgement".to_string(),
        "/ibc.core.client.v1.MsgUpdateClient".to_string(),
        "/ibc.core.channel.v1.MsgTimeout".to_string(),
    ]
}

fn default_max_bypass_gas() -> u64 {
    1_000_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AdmissionConfig {
    pub fn auth_params(&self) -> AuthParams {
        AuthParams {
            max_memo_characters: self.auth.max_memo_characters,
            tx_sig_limit: self.auth.tx_sig_limit,
            tx_size_cost_per_byte: self.auth.tx_size_cost_per_byte,
            sig_verify_cost_ed25519: self.auth.sig_verify_cost_ed25519,
            sig_verify_cost_secp256k1: self.auth.sig_verify_cost_secp256k1,
        }
    }

    pub fn node_min_gas_prices(&self) -> Result<Vec<DecCoin>, ConfigError> {
        parse_dec_coins(&self.fees.min_gas_prices)
            .map_err(|e| ConfigError::Invalid(format!("fees.min_gas_prices: {}", e)))
    }

    /// Governance floor parameters, or `None` when no floor is configured.
    pub fn global_fee_params(&self) -> Result<Option<GlobalFeeParams>, ConfigError> {
        let prices = parse_dec_coins(&self.fees.minimum_gas_prices)
            .map_err(|e| ConfigError::Invalid(format!("fees.minimum_gas_prices: {}", e)))?;
        if prices.is_empty() {
            return Ok(None);
        }
        Ok(Some(GlobalFeeParams {
            minimum_gas_prices: prices,
            bypass_min_fee_msg_types: self.fees.bypass_min_fee_msg_types.clone(),
            max_total_bypass_min_fee_msg_gas_usage: self.fees.max_total_bypass_min_fee_msg_gas_usage,
        }))
    }

    pub fn floor_activation(&self) -> FloorActivation {
        match self.fees.floor_min_bonded_tokens {
            Some(min) => FloorActivation::MinBondedTokens(min),
            None => FloorActivation::Always,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.chain_id.trim().is_empty() {
            return Err(ConfigError::Invalid("chain.chain_id must be set".to_string()));
        }
        if self.chain.max_block_gas == Some(0) {
            return Err(ConfigError::Invalid(
                "chain.max_block_gas must be positive when set".to_string(),
            ));
        }
        if self.auth.tx_sig_limit == 0 {
            return Err(ConfigError::Invalid("auth.tx_sig_limit must be positive".to_string()));
        }
        self.node_min_gas_prices()?;
        self.global_fee_params()?;
        Ok(())
    }
}

/// Loads configuration from `path`, falling back to defaults when the file is absent.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AdmissionConfig, ConfigError> {
    let path = path.as_ref();
    let config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str)?
    } else {
        AdmissionConfig::default()
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config("/nonexistent/admission.toml").unwrap();
        assert_eq!(config.auth_params(), AuthParams::default());
        assert_eq!(config.governance.vote_policy, VotePolicy::Accept);
        assert_eq!(config.floor_activation(), FloorActivation::Always);
        assert!(config.global_fee_params().unwrap().is_none());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_full_file() {
        let file = write_config(
            r#"
[chain]
chain_id = "atomone-1"
max_block_gas = 50000000

[auth]
tx_sig_limit = 5

[fees]
min_gas_prices = "0.01uatone"
minimum_gas_prices = "0.0025uatone,0.5uphoton"
floor_min_bonded_tokens = 1000000

[governance]
vote_policy = "tag"

[log]
level = "debug"
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.chain.chain_id, "atomone-1");
        assert_eq!(config.chain.max_block_gas, Some(50_000_000));
        assert_eq!(config.auth_params().tx_sig_limit, 5);
        assert_eq!(config.auth_params().max_memo_characters, 256);
        assert_eq!(config.node_min_gas_prices().unwrap().len(), 1);
        let global = config.global_fee_params().unwrap().unwrap();
        assert_eq!(global.minimum_gas_prices.len(), 2);
        assert_eq!(global.bypass_min_fee_msg_types.len(), 4);
        assert_eq!(config.floor_activation(), FloorActivation::MinBondedTokens(1_000_000));
        assert_eq!(config.governance.vote_policy, VotePolicy::Tag);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = write_config("[fees]\nmin_gas_prices = \"abc\"\n");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Invalid(_))));

        let file = write_config("[auth]\ntx_sig_limit = 0\n");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Invalid(_))));

        let file = write_config("[chain\n");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Toml(_))));
    }
}
