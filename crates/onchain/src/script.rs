//! Output script construction for the supported witness programs.

use crate::address::{Address, AddressType};

/// The P2WPKH scriptPubKey: `OP_0 <20-byte push>`.
pub fn p2wpkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(22);
    script.push(0x00);
    script.push(0x14);
    script.extend_from_slice(pubkey_hash);
    script
}

/// The P2TR scriptPubKey: `OP_1 <32-byte push>`.
pub fn p2tr_script(output_key: &[u8; 32]) -> Vec<u8> {
    let mut script = Vec::with_capacity(34);
    script.push(0x51);
    script.push(0x20);
    script.extend_from_slice(output_key);
    script
}

/// ScriptPubKey for a decoded address. Program lengths were validated at
/// decode time, so the conversions cannot fail.
pub fn script_for_address(addr: &Address) -> Vec<u8> {
    match addr.kind {
        AddressType::P2wpkh => {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&addr.program);
            p2wpkh_script(&hash)
        }
        AddressType::P2tr => {
            let mut key = [0u8; 32];
            key.copy_from_slice(&addr.program);
            p2tr_script(&key)
        }
    }
}
