//! Consensus transaction serialization.
//!
//! Two encodings exist: the legacy layout, hashed for the txid, and the
//! SegWit marker/flag layout that appends per-input witness stacks, hashed
//! for the wtxid. Without witness data the two encodings coincide.

use crate::error::AddressError;
use crate::hash::sha256d;

/// Reference to a previous transaction output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutPoint {
    pub hash: [u8; 32],
    pub index: u32,
}

impl OutPoint {
    /// Parse a 64-hex-character txid into an outpoint.
    pub fn from_txid_str(txid: &str, index: u32) -> Result<Self, AddressError> {
        if txid.len() != 64 {
            return Err(AddressError::BadTxid);
        }
        let bytes = hex::decode(txid).map_err(|_| AddressError::BadTxid)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(OutPoint { hash, index })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxIn {
    pub previous_outpoint: OutPoint,
    pub signature_script: Vec<u8>,
    pub witness: Vec<Vec<u8>>,
    pub sequence: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: i64,
    pub pk_script: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn new(version: i32) -> Self {
        Transaction {
            version,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    pub fn add_input(&mut self, input: TxIn) {
        self.inputs.push(input);
    }

    pub fn add_output(&mut self, output: TxOut) {
        self.outputs.push(output);
    }

    /// Serialize the transaction.
    ///
    /// With `include_witness`, the SegWit marker/flag and per-input stacks
    /// are emitted when any input carries witness data; otherwise the
    /// legacy layout is produced regardless.
    pub fn serialize(&self, include_witness: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size_hint());
        out.extend_from_slice(&self.version.to_le_bytes());

        let has_witness = include_witness && self.inputs.iter().any(|i| !i.witness.is_empty());
        if has_witness {
            out.push(0x00);
            out.push(0x01);
        }

        write_varint(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(&input.previous_outpoint.hash);
            out.extend_from_slice(&input.previous_outpoint.index.to_le_bytes());
            write_varint(&mut out, input.signature_script.len() as u64);
            out.extend_from_slice(&input.signature_script);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_varint(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            write_tx_out(&mut out, output);
        }

        if has_witness {
            for input in &self.inputs {
                write_witness_stack(&mut out, &input.witness);
            }
        }

        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Legacy double SHA-256; witness data never contributes.
    pub fn txid(&self) -> [u8; 32] {
        sha256d(&self.serialize(false))
    }

    /// Witness-inclusive double SHA-256; equals `txid` without witnesses.
    pub fn wtxid(&self) -> [u8; 32] {
        sha256d(&self.serialize(true))
    }

    fn size_hint(&self) -> usize {
        10 + self.inputs.len() * 41 + self.outputs.iter().map(|o| 9 + o.pk_script.len()).sum::<usize>()
    }
}

/// Bitcoin variable-length integer.
pub fn write_varint(out: &mut Vec<u8>, val: u64) {
    if val < 0xfd {
        out.push(val as u8);
    } else if val <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(val as u16).to_le_bytes());
    } else if val <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(val as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&val.to_le_bytes());
    }
}

/// `value(i64 LE) || varint(script len) || script`, shared with the PSBT
/// witness_utxo field.
pub(crate) fn write_tx_out(out: &mut Vec<u8>, txout: &TxOut) {
    out.extend_from_slice(&txout.value.to_le_bytes());
    write_varint(out, txout.pk_script.len() as u64);
    out.extend_from_slice(&txout.pk_script);
}

/// `varint(stack size)` then `varint(item len) || item` per stack item.
pub(crate) fn write_witness_stack(out: &mut Vec<u8>, witness: &[Vec<u8>]) {
    write_varint(out, witness.len() as u64);
    for item in witness {
        write_varint(out, item.len() as u64);
        out.extend_from_slice(item);
    }
}
