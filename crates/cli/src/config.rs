//! JSON configuration for the planner driver.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sweeper_core::Sweeper;

use onchain::Network;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// One of bitcoin_mainnet, bitcoin_testnet, litecoin_mainnet,
    /// litecoin_testnet.
    pub network: String,
    /// Fee rate in satoshis per virtual byte.
    pub fee_rate: i64,
    /// Dust threshold in USD and the BTC price used to convert it.
    pub dust_threshold_usd: f64,
    pub price_usd_per_btc: f64,
    pub allow_unconfirmed: bool,
    /// Maximum unconfirmed inputs admitted per plan.
    pub max_unconfirmed: usize,
    /// Maximum planned-descendant depth for an unconfirmed txid.
    pub max_chain_depth: u32,
    pub change_split_parts: usize,
    pub target_chunk_sats: i64,
    pub min_chunk_sats: i64,
    /// "human" or "json".
    pub output_format: String,
    /// Skip strict address validation.
    pub test_mode: bool,
    /// Require indexed addresses to commit to the configured pubkey.
    pub enforce_pubkey: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            network: "bitcoin_testnet".into(),
            fee_rate: 5,
            dust_threshold_usd: 0.50,
            price_usd_per_btc: 55_000.0,
            allow_unconfirmed: true,
            max_unconfirmed: 2,
            max_chain_depth: 2,
            change_split_parts: 1,
            target_chunk_sats: 60_000,
            min_chunk_sats: 20_000,
            output_format: "human".into(),
            test_mode: true,
            enforce_pubkey: false,
        }
    }
}

impl Config {
    /// Load from a JSON file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let data = std::fs::read(path)
            .with_context(|| format!("can't read config file {}", path.display()))?;
        let config: Config = serde_json::from_slice(&data)
            .with_context(|| format!("can't parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.network()?;
        if self.fee_rate <= 0 {
            bail!("bad config field fee_rate: must be positive, got {}", self.fee_rate);
        }
        if self.dust_threshold_usd < 0.0 {
            bail!(
                "bad config field dust_threshold_usd: must be non-negative, got {}",
                self.dust_threshold_usd
            );
        }
        if self.price_usd_per_btc <= 0.0 {
            bail!(
                "bad config field price_usd_per_btc: must be positive, got {}",
                self.price_usd_per_btc
            );
        }
        if self.change_split_parts < 1 {
            bail!(
                "bad config field change_split_parts: must be at least 1, got {}",
                self.change_split_parts
            );
        }
        if self.target_chunk_sats < 0 {
            bail!(
                "bad config field target_chunk_sats: must be non-negative, got {}",
                self.target_chunk_sats
            );
        }
        if self.min_chunk_sats < 0 {
            bail!(
                "bad config field min_chunk_sats: must be non-negative, got {}",
                self.min_chunk_sats
            );
        }
        if self.output_format != "human" && self.output_format != "json" {
            bail!(
                "bad config field output_format: must be \"human\" or \"json\", got {:?}",
                self.output_format
            );
        }
        Ok(())
    }

    pub fn network(&self) -> Result<Network> {
        Ok(match self.network.as_str() {
            "bitcoin_mainnet" => Network::BitcoinMainnet,
            "bitcoin_testnet" => Network::BitcoinTestnet,
            "litecoin_mainnet" => Network::LitecoinMainnet,
            "litecoin_testnet" => Network::LitecoinTestnet,
            other => bail!(
                "bad config field network: {:?} is not one of bitcoin_mainnet, \
                 bitcoin_testnet, litecoin_mainnet, litecoin_testnet",
                other
            ),
        })
    }

    pub fn apply_to(&self, sweeper: &mut Sweeper) -> Result<()> {
        sweeper.set_network(self.network()?);
        sweeper
            .set_fee_rate(self.fee_rate)
            .context("can't apply fee rate")?;
        sweeper.set_dust_rate(
            (self.dust_threshold_usd * 100.0) as i64,
            self.dust_threshold_usd,
            self.price_usd_per_btc,
        );
        sweeper.set_unconfirmed_policy(
            self.allow_unconfirmed,
            self.max_unconfirmed,
            self.max_chain_depth,
        );
        sweeper.set_test_mode(self.test_mode);
        sweeper.set_pubkey_check(self.enforce_pubkey);
        sweeper.set_change_split(
            self.change_split_parts,
            self.target_chunk_sats,
            self.min_chunk_sats,
        );
        Ok(())
    }
}
