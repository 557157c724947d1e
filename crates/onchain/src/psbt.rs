//! BIP-174 PSBT assembly.
//!
//! Only the serializer side exists: the planner emits an unsigned
//! transaction in the global map plus a `witness_utxo` per input, and an
//! external signer fills in the rest. Keys and values are varint
//! length-prefixed; every map ends with a 0x00 terminator.

use base64::{engine::general_purpose, Engine as _};

use crate::transaction::{write_tx_out, write_varint, write_witness_stack, Transaction, TxOut};

pub const PSBT_MAGIC: &[u8; 5] = b"psbt\xff";

const GLOBAL_UNSIGNED_TX: u8 = 0x00;
const IN_WITNESS_UTXO: u8 = 0x01;
const IN_FINAL_SCRIPTSIG: u8 = 0x07;
const IN_FINAL_SCRIPTWITNESS: u8 = 0x08;
const OUT_REDEEM_SCRIPT: u8 = 0x00;
const OUT_WITNESS_SCRIPT: u8 = 0x01;

/// Per-input signing metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PsbtInput {
    pub witness_utxo: Option<TxOut>,
    pub final_script_sig: Option<Vec<u8>>,
    pub final_script_witness: Vec<Vec<u8>>,
}

/// Per-output spending metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PsbtOutput {
    pub redeem_script: Option<Vec<u8>>,
    pub witness_script: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Psbt {
    pub unsigned_tx: Transaction,
    pub inputs: Vec<PsbtInput>,
    pub outputs: Vec<PsbtOutput>,
}

impl Psbt {
    /// Wrap an unsigned transaction with one empty record per input and
    /// output.
    pub fn from_unsigned_tx(tx: Transaction) -> Self {
        let inputs = vec![PsbtInput::default(); tx.inputs.len()];
        let outputs = vec![PsbtOutput::default(); tx.outputs.len()];
        Psbt {
            unsigned_tx: tx,
            inputs,
            outputs,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(PSBT_MAGIC);

        // Global map: the unsigned transaction in its legacy encoding.
        write_kv(&mut out, GLOBAL_UNSIGNED_TX, &self.unsigned_tx.serialize(false));
        out.push(0x00);

        for input in &self.inputs {
            if let Some(utxo) = &input.witness_utxo {
                let mut val = Vec::with_capacity(9 + utxo.pk_script.len());
                write_tx_out(&mut val, utxo);
                write_kv(&mut out, IN_WITNESS_UTXO, &val);
            }
            if let Some(script_sig) = &input.final_script_sig {
                write_kv(&mut out, IN_FINAL_SCRIPTSIG, script_sig);
            }
            if !input.final_script_witness.is_empty() {
                let mut val = Vec::new();
                write_witness_stack(&mut val, &input.final_script_witness);
                write_kv(&mut out, IN_FINAL_SCRIPTWITNESS, &val);
            }
            out.push(0x00);
        }

        for output in &self.outputs {
            if let Some(redeem) = &output.redeem_script {
                write_kv(&mut out, OUT_REDEEM_SCRIPT, redeem);
            }
            if let Some(witness) = &output.witness_script {
                write_kv(&mut out, OUT_WITNESS_SCRIPT, witness);
            }
            out.push(0x00);
        }

        out
    }

    /// Standard base64 framing with `=` padding.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.serialize())
    }
}

fn write_kv(out: &mut Vec<u8>, key_type: u8, value: &[u8]) {
    write_varint(out, 1);
    out.push(key_type);
    write_varint(out, value.len() as u64);
    out.extend_from_slice(value);
}
