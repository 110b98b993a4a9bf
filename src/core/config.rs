use crate::core::error::{BridgeError, Result};
use crate::pubsub::DecodeErrorPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub md_front_address: String,
    pub trader_front_address: String,
    pub broker_id: String,
    pub investor_id: String,
    pub password: String,
    pub mq_pub_addr: String,
    pub mq_sub_addr: String,
    pub redis_url: String,
    /// Marketable offset added to (buy) or taken from (sell) the requested
    /// price of a market order.
    pub market_price_offset: f64,
    pub minimum_price: f64,
    pub terminal_grace_secs: u64,
    pub decode_error_policy: DecodeErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            md_front_address: String::new(),
            trader_front_address: String::new(),
            broker_id: String::new(),
            investor_id: String::new(),
            password: String::new(),
            mq_pub_addr: String::new(),
            mq_sub_addr: String::new(),
            redis_url: "redis://localhost:6379".to_string(),
            market_price_offset: 100.0,
            minimum_price: 1.0,
            terminal_grace_secs: 30,
            decode_error_policy: DecodeErrorPolicy::Drop,
        }
    }
}

impl Config {
    /// Checks that every field the collaborators need before `connect` is set.
    pub fn validate(&self) -> Result<()> {
        let required: [(&'static str, &str); 7] = [
            ("md_front_address", &self.md_front_address),
            ("trader_front_address", &self.trader_front_address),
            ("broker_id", &self.broker_id),
            ("investor_id", &self.investor_id),
            ("password", &self.password),
            ("mq_pub_addr", &self.mq_pub_addr),
            ("mq_sub_addr", &self.mq_sub_addr),
        ];
        for (name, value) in required.iter() {
            if value.trim().is_empty() {
                return Err(BridgeError::MissingConfiguration(name));
            }
        }
        Ok(())
    }

    pub fn terminal_grace(&self) -> Duration {
        Duration::from_secs(self.terminal_grace_secs)
    }
}

pub struct ConfigStore {
    cfg: Config,
}

impl ConfigStore {
    /// Loads `./environments/{ENV}.config.toml`.
    pub fn new() -> Result<ConfigStore> {
        let environment =
            std::env::var("ENV").map_err(|_| BridgeError::MissingConfiguration("ENV"))?;
        Self::from_path(format!(
            "./environments/{}.config.toml",
            environment.to_lowercase()
        ))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ConfigStore> {
        let cfg: Config = confy::load_path(path.as_ref())?;
        log::debug!("loaded config from {}", path.as_ref().display());
        Ok(ConfigStore { cfg })
    }

    pub fn load() -> Result<Config> {
        Ok(ConfigStore::new()?.cfg)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn into_config(self) -> Config {
        self.cfg
    }
}
