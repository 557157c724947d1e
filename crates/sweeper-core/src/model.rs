use onchain::{Psbt, Transaction};
use serde::{Deserialize, Serialize};

/// A spendable output owned by the wallet. Identity is `(txid, vout)`;
/// the struct is immutable once indexed.
///
/// Field names follow the stable on-disk document format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    #[serde(rename = "TxID")]
    pub txid: String,
    #[serde(rename = "Vout")]
    pub vout: u32,
    #[serde(rename = "ValueSats")]
    pub value_sats: i64,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Confirmed")]
    pub confirmed: bool,
}

/// A requested payment: destination address and amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendOutput {
    pub address: String,
    pub value_sats: i64,
}

/// An allocation target with a weight in basis points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedAddr {
    pub address: String,
    pub weight_bp: i64,
}

/// The product of a planning call: everything an external signer and a
/// broadcaster need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionPlan {
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<SpendOutput>,
    pub fee_sats: i64,
    pub raw_tx: Transaction,
    pub psbt: Psbt,
    /// Indices into `outputs` that carry change rather than payments.
    pub change_idxs: Vec<usize>,
}

impl TransactionPlan {
    pub fn total_in(&self) -> i64 {
        self.inputs.iter().map(|u| u.value_sats).sum()
    }

    pub fn total_out(&self) -> i64 {
        self.outputs.iter().map(|o| o.value_sats).sum()
    }
}
