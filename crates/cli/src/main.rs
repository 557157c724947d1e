//! Planner driver: loads UTXOs from JSON, applies the config, plans a
//! spend, and prints a PSBT for an external signer.

mod config;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};

use config::Config;
use sweeper_core::{SpendOutput, Sweeper, TransactionPlan, Utxo};

/// Testnet destination used when neither `--dest` nor `DEST_ADDR` is given.
const DEFAULT_DEST_ADDR: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

/// Deterministic placeholder key, suitable only for test mode.
const DEMO_PUBKEY: &[u8] = b"demo_compressed_pubkey_placeholder_33_bytes!!!!";

#[derive(Parser, Debug)]
#[command(
    name = "sweep-cli",
    version,
    about = "Offline UTXO spend planner: index UTXOs, plan a spend, print a PSBT"
)]
struct Cli {
    /// Destination address (overrides the DEST_ADDR env var).
    #[arg(long)]
    dest: Option<String>,

    /// Configuration file path.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// UTXO input document.
    #[arg(long, default_value = "utxos.json")]
    utxos: PathBuf,

    /// Amount to send, in satoshis.
    #[arg(long, default_value_t = 150_000)]
    amount: i64,

    /// 33-byte compressed pubkey hex (overrides the PUBKEY_HEX env var).
    #[arg(long)]
    pubkey: Option<String>,

    /// 32-byte x-only output key hex for P2TR change (overrides the
    /// TAPROOT_XONLY_HEX env var).
    #[arg(long)]
    taproot_xonly: Option<String>,

    /// Override the configured output format (human|json).
    #[arg(long)]
    format: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(&cli.config)?;
    if let Some(format) = cli.format {
        config.output_format = format;
        config.validate()?;
    }

    let dest = cli
        .dest
        .or_else(|| std::env::var("DEST_ADDR").ok())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DEST_ADDR.to_string());

    let pubkey = resolve_pubkey(cli.pubkey)?;
    let taproot_xonly = resolve_taproot_key(cli.taproot_xonly)?;

    let mut sweeper = Sweeper::new(pubkey, config.network()?);
    config.apply_to(&mut sweeper)?;
    if let Some(key) = taproot_xonly {
        sweeper
            .set_taproot_change_key(&key)
            .context("can't apply taproot change key")?;
    }

    let utxos = load_utxos(&cli.utxos)?;
    let mut indexed = 0usize;
    for (i, utxo) in utxos.into_iter().enumerate() {
        let label = format!("{}:{}", utxo.txid, utxo.vout);
        match sweeper.index(utxo) {
            Ok(()) => indexed += 1,
            Err(err) => warn!("skipping UTXO {i} ({label}): {err}"),
        }
    }
    info!("indexed {indexed} UTXOs");

    let plan = sweeper.spend(vec![SpendOutput {
        address: dest,
        value_sats: cli.amount,
    }])?;
    let psbt_b64 = plan.psbt.to_base64();

    if config.output_format == "json" {
        print_json(&sweeper, &plan, &psbt_b64)?;
    } else {
        print_human(&sweeper, &plan, &psbt_b64);
    }
    Ok(())
}

fn resolve_pubkey(flag: Option<String>) -> Result<Vec<u8>> {
    let hex_str = flag
        .or_else(|| std::env::var("PUBKEY_HEX").ok())
        .filter(|s| !s.is_empty());
    match hex_str {
        Some(s) => {
            let bytes = hex::decode(&s).context("invalid pubkey hex")?;
            if bytes.len() != 33 {
                bail!("pubkey must be 33 bytes compressed, got {}", bytes.len());
            }
            Ok(bytes)
        }
        None => Ok(DEMO_PUBKEY[..33].to_vec()),
    }
}

fn resolve_taproot_key(flag: Option<String>) -> Result<Option<Vec<u8>>> {
    let hex_str = flag
        .or_else(|| std::env::var("TAPROOT_XONLY_HEX").ok())
        .filter(|s| !s.is_empty());
    match hex_str {
        Some(s) => {
            let bytes = hex::decode(&s).context("invalid taproot x-only key hex")?;
            if bytes.len() != 32 {
                bail!("taproot x-only key must be 32 bytes, got {}", bytes.len());
            }
            Ok(Some(bytes))
        }
        None => Ok(None),
    }
}

fn load_utxos(path: &PathBuf) -> Result<Vec<Utxo>> {
    let data = std::fs::read(path)
        .with_context(|| format!("can't read UTXO file {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| {
        format!(
            "can't parse {}; expected [{{\"TxID\":\"…\",\"Vout\":0,\"ValueSats\":80000,\
             \"Address\":\"tb1…\",\"Confirmed\":true}}]",
            path.display()
        )
    })
}

fn print_human(sweeper: &Sweeper, plan: &TransactionPlan, psbt_b64: &str) {
    println!("Transaction plan:");
    println!("  inputs:");
    for input in &plan.inputs {
        let state = if input.confirmed { "confirmed" } else { "unconfirmed" };
        println!(
            "    {}:{} {} sats ({state})",
            input.txid, input.vout, input.value_sats
        );
    }
    println!("  outputs:");
    for (i, output) in plan.outputs.iter().enumerate() {
        let role = if plan.change_idxs.contains(&i) {
            " (change)"
        } else {
            ""
        };
        println!("    {} {} sats{role}", output.address, output.value_sats);
    }
    println!("  fee: {} sats", plan.fee_sats);
    println!("  txid: {}", hex::encode(plan.raw_tx.txid()));
    println!("  psbt: {psbt_b64}");
    if !sweeper.pending_chain_depth().is_empty() {
        println!("  pending chain depth: {:?}", sweeper.pending_chain_depth());
    }
}

fn print_json(sweeper: &Sweeper, plan: &TransactionPlan, psbt_b64: &str) -> Result<()> {
    let doc = serde_json::json!({
        "transaction_plan": {
            "inputs": plan.inputs,
            "outputs": plan.outputs,
            "change_idxs": plan.change_idxs,
            "fee_sats": plan.fee_sats,
            "txid": hex::encode(plan.raw_tx.txid()),
            "psbt_b64": psbt_b64,
        },
        "chain_depth": sweeper.pending_chain_depth(),
    });
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
