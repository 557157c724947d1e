//! onchain — the Bitcoin-family on-wire surface, self-contained.
//!
//! Pieces:
//! - hash: SHA-256 / double SHA-256 / hash160 primitives
//! - bech32: BIP-173/BIP-350 encoding with version-selected checksums
//! - address: network table, P2WPKH/P2TR construction and parsing
//! - script: scriptPubKey builders for the two witness programs
//! - transaction: legacy and SegWit serialization, txid/wtxid
//! - psbt: BIP-174 key-value map assembly and base64 framing
//!
//! Everything here is deterministic byte plumbing with no I/O, so the whole
//! crate can be fuzzed and tested in isolation.

pub mod address;
pub mod bech32;
pub mod error;
pub mod hash;
pub mod psbt;
pub mod script;
pub mod transaction;

pub use address::{
    create_p2tr, create_p2wpkh, decode_address, derive_change_address, derive_deposit_address,
    validate_address, Address, AddressType, Asset, Network, NetworkConfig,
};
pub use error::AddressError;
pub use hash::{hash160, sha256, sha256d};
pub use psbt::{Psbt, PsbtInput, PsbtOutput, PSBT_MAGIC};
pub use script::{p2tr_script, p2wpkh_script, script_for_address};
pub use transaction::{write_varint, OutPoint, Transaction, TxIn, TxOut};
