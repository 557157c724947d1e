//! The planning facade.
//!
//! A `Sweeper` owns the indexed UTXO set, the admission policies, and the
//! unconfirmed chain-depth ledger. Planning calls are synchronous and
//! atomic: every fallible step runs before any state is touched, so a
//! failed plan leaves the instance exactly as it was.

use std::collections::BTreeMap;

use log::{debug, info};

use onchain::{
    create_p2tr, decode_address, derive_change_address, script_for_address, validate_address,
    Asset, Network, OutPoint, Psbt, Transaction, TxIn, TxOut,
};

use crate::allocate::{build_weighted_outputs, split_even};
use crate::error::PlanError;
use crate::fees::estimate_tx_vbytes;
use crate::model::{SpendOutput, TransactionPlan, Utxo, WeightedAddr};
use crate::spendable::{dust_from_usd, filter_candidates, SpendFilter};
use crate::storage::{KvStore, MemKv};

const SEQUENCE_FINAL: u32 = 0xffff_ffff;
const TX_VERSION: i32 = 2;
const FALLBACK_DUST_SATS: i64 = 600;

/// Change address sentinel used when strict validation is off.
const TEST_CHANGE_ADDR: &str = "tb1test_change_address";

const WEIGHTS_KEY: &[u8] = b"alloc:weights";

pub struct Sweeper {
    pubkey: Vec<u8>,
    network: Network,
    asset: Asset,
    fee_rate_sats_vb: i64,
    min_dust_sats: i64,
    min_usd: f64,
    price_usd_per_btc: f64,
    allow_unconfirmed: bool,
    max_unconf_inputs: usize,
    max_chain_depth: u32,
    test_mode: bool,
    enforce_pubkey: bool,

    change_split_parts: usize,
    target_chunk_sats: i64,
    min_chunk_sats: i64,
    allocation_weights: Vec<WeightedAddr>,
    taproot_change_key: Option<[u8; 32]>,

    kv: Box<dyn KvStore>,
    indexed: Vec<Utxo>,
    chain_depth: BTreeMap<String, u32>,
}

impl Sweeper {
    /// New instance with default policy: 5 sat/vB, 600 sat / $0.50 dust at
    /// $55,000 per BTC, unconfirmed allowed (2 inputs, depth 2), pubkey
    /// enforcement on, in-memory persistence.
    pub fn new(pubkey: Vec<u8>, network: Network) -> Self {
        Self::with_store(pubkey, network, Box::new(MemKv::new()))
    }

    /// Same defaults, caller-supplied persistence.
    pub fn with_store(pubkey: Vec<u8>, network: Network, kv: Box<dyn KvStore>) -> Self {
        Sweeper {
            pubkey,
            network,
            asset: network.asset(),
            fee_rate_sats_vb: 5,
            min_dust_sats: 600,
            min_usd: 0.50,
            price_usd_per_btc: 55_000.0,
            allow_unconfirmed: true,
            max_unconf_inputs: 2,
            max_chain_depth: 2,
            test_mode: false,
            enforce_pubkey: true,
            change_split_parts: 0,
            target_chunk_sats: 0,
            min_chunk_sats: 0,
            allocation_weights: Vec::new(),
            taproot_change_key: None,
            kv,
            indexed: Vec::new(),
            chain_depth: BTreeMap::new(),
        }
    }

    pub fn set_fee_rate(&mut self, rate: i64) -> Result<(), PlanError> {
        if rate <= 0 {
            return Err(PlanError::NonPositiveFeeRate);
        }
        self.fee_rate_sats_vb = rate;
        Ok(())
    }

    pub fn set_dust_rate(&mut self, sats: i64, usd: f64, price_usd_per_btc: f64) {
        self.min_dust_sats = sats;
        self.min_usd = usd;
        self.price_usd_per_btc = price_usd_per_btc;
    }

    pub fn set_network(&mut self, network: Network) {
        self.network = network;
        self.asset = network.asset();
    }

    pub fn set_pubkey(&mut self, pubkey: Vec<u8>) {
        self.pubkey = pubkey;
    }

    /// Skip strict address validation; change goes to a fixed sentinel.
    pub fn set_test_mode(&mut self, enabled: bool) {
        self.test_mode = enabled;
    }

    /// Require indexed addresses to commit to the configured pubkey.
    pub fn set_pubkey_check(&mut self, enabled: bool) {
        self.enforce_pubkey = enabled;
    }

    pub fn set_unconfirmed_policy(&mut self, allow: bool, max_inputs: usize, max_depth: u32) {
        self.allow_unconfirmed = allow;
        self.max_unconf_inputs = max_inputs;
        self.max_chain_depth = max_depth;
    }

    pub fn set_change_split(&mut self, parts: usize, target_chunk_sats: i64, min_chunk_sats: i64) {
        self.change_split_parts = parts;
        self.target_chunk_sats = target_chunk_sats;
        self.min_chunk_sats = min_chunk_sats;
    }

    pub fn set_allocation_weights(&mut self, weights: Vec<WeightedAddr>) {
        self.allocation_weights = weights;
    }

    /// Route change to a P2TR address derived from a 32-byte x-only key
    /// instead of the P2WPKH pubkey address.
    pub fn set_taproot_change_key(&mut self, key: &[u8]) -> Result<(), PlanError> {
        let key: [u8; 32] = key
            .try_into()
            .map_err(|_| PlanError::BadTaprootKey(key.len()))?;
        self.taproot_change_key = Some(key);
        Ok(())
    }

    /// Validate and persist allocation weights under `alloc:weights`.
    pub fn set_spending_wallets(&mut self, weights: Vec<WeightedAddr>) -> Result<(), PlanError> {
        if weights.is_empty() {
            return Err(PlanError::EmptyWeights);
        }
        for (i, w) in weights.iter().enumerate() {
            if w.weight_bp <= 0 {
                return Err(PlanError::BadWeight(i));
            }
            if !self.test_mode {
                decode_address(&w.address)
                    .map_err(|source| PlanError::AddressAt { index: i, source })?;
            }
        }
        let doc = serde_json::to_vec(&weights).map_err(|e| PlanError::Storage(e.to_string()))?;
        self.kv
            .put(WEIGHTS_KEY, &doc)
            .map_err(|e| PlanError::Storage(e.to_string()))?;
        debug!("persisted {} allocation weights", weights.len());
        self.allocation_weights = weights;
        Ok(())
    }

    /// Restore allocation weights persisted by `set_spending_wallets`.
    pub fn load_spending_wallets(&mut self) -> Result<(), PlanError> {
        let doc = self
            .kv
            .get(WEIGHTS_KEY)
            .map_err(|e| PlanError::Storage(e.to_string()))?;
        self.allocation_weights =
            serde_json::from_slice(&doc).map_err(|e| PlanError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Weighted spend over the persisted wallet list.
    pub fn spend_to_wallets(
        &mut self,
        total_sats: i64,
        min_chunk: i64,
    ) -> Result<TransactionPlan, PlanError> {
        if self.allocation_weights.is_empty() {
            return Err(PlanError::EmptyWeights);
        }
        let outs = build_weighted_outputs(total_sats, &self.allocation_weights, min_chunk);
        if outs.is_empty() {
            return Err(PlanError::EmptyAllocation);
        }
        self.spend(outs)
    }

    /// Admit a UTXO into the spendable index.
    ///
    /// Address validation (network, optionally pubkey commitment), the dust
    /// floor, and the unconfirmed policies all run before anything is
    /// recorded; the accepted UTXO is persisted as `utxo:<txid>:<vout>`.
    pub fn index(&mut self, utxo: Utxo) -> Result<(), PlanError> {
        self.validate_utxo_address(&utxo)?;

        let floor = self.effective_dust();
        if utxo.value_sats < floor {
            return Err(PlanError::DustBelowThreshold {
                value: utxo.value_sats,
                floor,
            });
        }

        if !utxo.confirmed {
            if !self.allow_unconfirmed {
                return Err(PlanError::UnconfirmedNotAllowed);
            }
            let depth = self.chain_depth_of(&utxo.txid);
            if depth >= self.max_chain_depth {
                return Err(PlanError::ChainDepthExceeded {
                    depth,
                    max: self.max_chain_depth,
                });
            }
        }

        let key = format!("utxo:{}:{}", utxo.txid, utxo.vout);
        let doc = serde_json::to_vec(&utxo).map_err(|e| PlanError::Storage(e.to_string()))?;
        self.kv
            .put(key.as_bytes(), &doc)
            .map_err(|e| PlanError::Storage(e.to_string()))?;

        debug!("indexed {}:{} ({} sats)", utxo.txid, utxo.vout, utxo.value_sats);
        self.indexed.push(utxo);
        Ok(())
    }

    /// Plan a spend to the given fixed outputs, adding change per policy.
    pub fn spend(&mut self, outputs: Vec<SpendOutput>) -> Result<TransactionPlan, PlanError> {
        if outputs.is_empty() {
            return Err(PlanError::NoOutputs);
        }
        for (i, output) in outputs.iter().enumerate() {
            if !self.test_mode {
                decode_address(&output.address)
                    .map_err(|source| PlanError::AddressAt { index: i, source })?;
            }
            if output.value_sats <= 0 {
                return Err(PlanError::BadOutputValue {
                    index: i,
                    value: output.value_sats,
                });
            }
        }

        let change_addr = self.change_address()?;
        let plan = self.build_plan(&self.indexed, outputs, &change_addr)?;
        self.commit_chain_depth(&plan.inputs);
        info!(
            "planned spend: {} inputs, {} outputs, fee {} sats",
            plan.inputs.len(),
            plan.outputs.len(),
            plan.fee_sats
        );
        Ok(plan)
    }

    /// Sweep every candidate into a single destination output, no change.
    pub fn consolidate_all(&mut self, dest_addr: &str) -> Result<TransactionPlan, PlanError> {
        if !self.test_mode {
            decode_address(dest_addr)?;
        }
        let dust = self.effective_dust();
        let cands = filter_candidates(&self.indexed, self.spend_filter(dust));
        if cands.is_empty() {
            return Err(PlanError::NoSpendableUtxos);
        }

        let total_in: i64 = cands.iter().map(|u| u.value_sats).sum();
        let vbytes = estimate_tx_vbytes(cands.len(), 1);
        let fee = vbytes * self.fee_rate_sats_vb;
        if total_in <= fee || total_in - fee < dust {
            return Err(PlanError::ConsolidationBelowDust);
        }

        let outputs = vec![SpendOutput {
            address: dest_addr.to_string(),
            value_sats: total_in - fee,
        }];

        let mut tx = Transaction::new(TX_VERSION);
        for input in &cands {
            tx.add_input(TxIn {
                previous_outpoint: OutPoint::from_txid_str(&input.txid, input.vout)?,
                signature_script: Vec::new(),
                witness: Vec::new(),
                sequence: SEQUENCE_FINAL,
            });
        }
        tx.add_output(TxOut {
            value: outputs[0].value_sats,
            pk_script: self.output_script(dest_addr)?,
        });

        let mut psbt = Psbt::from_unsigned_tx(tx.clone());
        for (i, input) in cands.iter().enumerate() {
            psbt.inputs[i].witness_utxo = Some(TxOut {
                value: input.value_sats,
                pk_script: self.output_script(&input.address)?,
            });
        }

        self.commit_chain_depth(&cands);
        info!(
            "planned consolidation: {} inputs into {} ({} sats after {} fee)",
            cands.len(),
            dest_addr,
            total_in - fee,
            fee
        );
        Ok(TransactionPlan {
            inputs: cands,
            outputs,
            fee_sats: fee,
            raw_tx: tx,
            psbt,
            change_idxs: Vec::new(),
        })
    }

    /// Split `total_sats` evenly across the destinations, then spend.
    pub fn spend_even(
        &mut self,
        dest_addrs: &[String],
        total_sats: i64,
        min_chunk: i64,
    ) -> Result<TransactionPlan, PlanError> {
        if dest_addrs.is_empty() {
            return Err(PlanError::NoDestinations);
        }
        let chunks = split_even(total_sats, dest_addrs.len(), min_chunk);
        if chunks.is_empty() {
            return Err(PlanError::EmptySplit);
        }
        let outs: Vec<SpendOutput> = dest_addrs
            .iter()
            .zip(&chunks)
            .map(|(address, &value_sats)| SpendOutput {
                address: address.clone(),
                value_sats,
            })
            .collect();
        self.spend(outs)
    }

    /// Distribute `total_sats` across weighted addresses, then spend.
    pub fn spend_weighted(
        &mut self,
        weights: &[WeightedAddr],
        total_sats: i64,
        min_chunk: i64,
    ) -> Result<TransactionPlan, PlanError> {
        let outs = build_weighted_outputs(total_sats, weights, min_chunk);
        if outs.is_empty() {
            return Err(PlanError::EmptyAllocation);
        }
        self.spend(outs)
    }

    /// Plan a follow-up spend funded by a parent plan's change outputs,
    /// treated as unconfirmed UTXOs of the parent transaction.
    pub fn plan_child_from_change(
        &mut self,
        parent: &TransactionPlan,
        dests: Vec<SpendOutput>,
    ) -> Result<TransactionPlan, PlanError> {
        if parent.change_idxs.is_empty() {
            return Err(PlanError::NoParentChange);
        }
        let parent_txid = hex::encode(parent.raw_tx.txid());
        let child_utxos: Vec<Utxo> = parent
            .change_idxs
            .iter()
            .map(|&idx| {
                let o = &parent.outputs[idx];
                Utxo {
                    txid: parent_txid.clone(),
                    vout: idx as u32,
                    value_sats: o.value_sats,
                    address: o.address.clone(),
                    confirmed: false,
                }
            })
            .collect();

        let change_addr = self.change_address()?;
        let plan = self.build_plan(&child_utxos, dests, &change_addr)?;
        self.commit_chain_depth(&plan.inputs);
        Ok(plan)
    }

    pub fn indexed_utxos(&self) -> &[Utxo] {
        &self.indexed
    }

    /// Chain-depth ledger: txid of a consumed unconfirmed input mapped to
    /// how many planned descendants ride on it.
    pub fn pending_chain_depth(&self) -> &BTreeMap<String, u32> {
        &self.chain_depth
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn asset(&self) -> Asset {
        self.asset
    }

    /// Drop the index and the chain-depth ledger.
    pub fn clear_index(&mut self) {
        self.indexed.clear();
        self.chain_depth.clear();
    }

    fn validate_utxo_address(&self, utxo: &Utxo) -> Result<(), PlanError> {
        if self.test_mode {
            return Ok(());
        }
        let addr = decode_address(&utxo.address)?;
        if addr.network != self.network {
            return Err(onchain::AddressError::NetworkMismatch.into());
        }
        if self.enforce_pubkey {
            validate_address(&utxo.address, &self.pubkey, self.network)?;
        }
        Ok(())
    }

    /// `max(min_dust_sats, ceil(min_usd / price * 1e8))`.
    fn effective_dust(&self) -> i64 {
        self.min_dust_sats
            .max(dust_from_usd(self.min_usd, self.price_usd_per_btc))
    }

    fn spend_filter(&self, dust_floor: i64) -> SpendFilter {
        SpendFilter {
            dust_floor,
            allow_unconfirmed: self.allow_unconfirmed,
            max_unconf_inputs: self.max_unconf_inputs,
        }
    }

    fn chain_depth_of(&self, txid: &str) -> u32 {
        self.chain_depth.get(txid).copied().unwrap_or(0)
    }

    /// Record that a plan consumed unconfirmed inputs. Called only after a
    /// plan has fully succeeded.
    fn commit_chain_depth(&mut self, inputs: &[Utxo]) {
        for input in inputs {
            if !input.confirmed {
                *self.chain_depth.entry(input.txid.clone()).or_insert(0) += 1;
            }
        }
    }

    fn change_address(&self) -> Result<String, PlanError> {
        if self.test_mode {
            return Ok(TEST_CHANGE_ADDR.to_string());
        }
        match &self.taproot_change_key {
            Some(key) => Ok(create_p2tr(key, self.network)?),
            None => Ok(derive_change_address(&self.pubkey, self.network)?),
        }
    }

    fn output_script(&self, addr: &str) -> Result<Vec<u8>, PlanError> {
        if self.test_mode {
            // Shape-correct P2WPKH script for sentinel addresses.
            let mut script = vec![0x00, 0x14];
            script.extend(0u8..20);
            return Ok(script);
        }
        let decoded = decode_address(addr)?;
        Ok(script_for_address(&decoded))
    }

    /// Greedy ascending selection with fee convergence.
    ///
    /// One change slot is reserved in the output count while walking, so a
    /// later change output never invalidates the selection.
    fn select_utxos(
        &self,
        target_out_sats: i64,
        utxos: &[Utxo],
        dust: i64,
        n_fixed_outputs: usize,
    ) -> Result<(Vec<Utxo>, i64, i64), PlanError> {
        let cands = filter_candidates(utxos, self.spend_filter(dust));
        if cands.is_empty() {
            return Err(PlanError::NoSpendableUtxos);
        }

        let mut selected = Vec::new();
        let mut total_in: i64 = 0;
        for cand in cands {
            total_in += cand.value_sats;
            selected.push(cand);
            let est_vbytes = estimate_tx_vbytes(selected.len(), n_fixed_outputs + 1);
            let fee = est_vbytes * self.fee_rate_sats_vb;
            if total_in >= target_out_sats + fee {
                return Ok((selected, total_in, fee));
            }
        }
        Err(PlanError::InsufficientFunds)
    }

    fn build_plan(
        &self,
        utxos: &[Utxo],
        outputs: Vec<SpendOutput>,
        change_addr: &str,
    ) -> Result<TransactionPlan, PlanError> {
        let mut dust = self.effective_dust();
        if dust <= 0 {
            dust = FALLBACK_DUST_SATS;
        }

        let total_out: i64 = outputs.iter().map(|o| o.value_sats).sum();
        if total_out <= 0 {
            return Err(PlanError::NonPositiveTotal);
        }

        let (selected, total_in, est_fee) =
            self.select_utxos(total_out, utxos, dust, outputs.len())?;
        let change = total_in - total_out - est_fee;

        let mut final_outputs = outputs;
        let mut change_idxs: Vec<usize> = Vec::new();

        if change > dust {
            // Multi-output change modes grow the transaction beyond the one
            // slot the selector reserved, so the change available to them is
            // computed net of the fee at the grown output count. Otherwise
            // reconciliation below would always come up short.
            if !self.allocation_weights.is_empty() {
                // Weighted allocation of change across configured addresses.
                let n = self.allocation_weights.len();
                let avail = total_in
                    - total_out
                    - estimate_tx_vbytes(selected.len(), final_outputs.len() + n)
                        * self.fee_rate_sats_vb;
                let ws = build_weighted_outputs(avail, &self.allocation_weights, dust.max(1));
                for w in ws {
                    final_outputs.push(w);
                    change_idxs.push(final_outputs.len() - 1);
                }
            } else if self.change_split_parts > 1 && self.min_chunk_sats > 0 {
                let mut parts = self.change_split_parts;
                if self.target_chunk_sats > 0 {
                    let guess = (change / self.target_chunk_sats) as usize;
                    if guess >= 2 {
                        parts = guess;
                    }
                }
                let avail = total_in
                    - total_out
                    - estimate_tx_vbytes(selected.len(), final_outputs.len() + parts)
                        * self.fee_rate_sats_vb;
                let chunks = split_even(avail, parts, self.min_chunk_sats.max(dust));
                for chunk in chunks {
                    if chunk >= dust {
                        final_outputs.push(SpendOutput {
                            address: change_addr.to_string(),
                            value_sats: chunk,
                        });
                        change_idxs.push(final_outputs.len() - 1);
                    }
                }
                if change_idxs.is_empty() {
                    final_outputs.push(SpendOutput {
                        address: change_addr.to_string(),
                        value_sats: change,
                    });
                    change_idxs.push(final_outputs.len() - 1);
                }
            } else {
                final_outputs.push(SpendOutput {
                    address: change_addr.to_string(),
                    value_sats: change,
                });
                change_idxs.push(final_outputs.len() - 1);
            }
        }

        // Reconcile the fee against the final output count. The delta is
        // measured against everything laid out so far, so exactly
        // `total_in - final_fee` leaves the transaction as outputs.
        let laid_out: i64 = final_outputs.iter().map(|o| o.value_sats).sum();
        let vbytes = estimate_tx_vbytes(selected.len(), final_outputs.len());
        let mut final_fee = vbytes * self.fee_rate_sats_vb;
        let change_delta = total_in - laid_out - final_fee;
        if change_delta < 0 {
            return Err(PlanError::FinalFeeOvershoot);
        }
        match change_idxs.len() {
            1 => final_outputs[change_idxs[0]].value_sats += change_delta,
            0 => {
                // Dust-sized residual is absorbed into the fee.
                final_fee = total_in - laid_out;
            }
            k => {
                let per = change_delta / k as i64;
                let rem = change_delta - per * k as i64;
                for (i, &idx) in change_idxs.iter().enumerate() {
                    let add = per + i64::from((i as i64) < rem);
                    final_outputs[idx].value_sats += add;
                }
            }
        }

        let mut tx = Transaction::new(TX_VERSION);
        for input in &selected {
            tx.add_input(TxIn {
                previous_outpoint: OutPoint::from_txid_str(&input.txid, input.vout)?,
                signature_script: Vec::new(),
                witness: Vec::new(),
                sequence: SEQUENCE_FINAL,
            });
        }
        for output in &final_outputs {
            tx.add_output(TxOut {
                value: output.value_sats,
                pk_script: self.output_script(&output.address)?,
            });
        }

        let mut psbt = Psbt::from_unsigned_tx(tx.clone());
        for (i, input) in selected.iter().enumerate() {
            psbt.inputs[i].witness_utxo = Some(TxOut {
                value: input.value_sats,
                pk_script: self.output_script(&input.address)?,
            });
        }

        Ok(TransactionPlan {
            inputs: selected,
            outputs: final_outputs,
            fee_sats: final_fee,
            raw_tx: tx,
            psbt,
            change_idxs,
        })
    }
}
