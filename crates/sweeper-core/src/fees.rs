//! Virtual-size estimation for fee math.

use onchain::{decode_address, AddressType};

use crate::model::{SpendOutput, Utxo};

pub const BASE_OVERHEAD_VBYTES: i64 = 10;
pub const INPUT_VBYTES_TAPROOT: i64 = 58;
pub const INPUT_VBYTES_P2WPKH: i64 = 68;
pub const OUTPUT_VBYTES: i64 = 31;

/// Baseline estimate assuming taproot-weight inputs. The selection loop and
/// fee reconciliation both use this model, so planned fees are a pure
/// function of input and output counts.
pub fn estimate_tx_vbytes(n_in: usize, n_out: usize) -> i64 {
    BASE_OVERHEAD_VBYTES + n_in as i64 * INPUT_VBYTES_TAPROOT + n_out as i64 * OUTPUT_VBYTES
}

/// Address-type-aware estimate: P2WPKH inputs weigh more than taproot
/// inputs. Addresses that do not decode fall back to the taproot weight.
pub fn estimate_tx_vbytes_detailed(inputs: &[Utxo], outputs: &[SpendOutput]) -> i64 {
    let in_vbytes: i64 = inputs
        .iter()
        .map(|u| match decode_address(&u.address) {
            Ok(addr) if addr.kind == AddressType::P2wpkh => INPUT_VBYTES_P2WPKH,
            _ => INPUT_VBYTES_TAPROOT,
        })
        .sum();
    BASE_OVERHEAD_VBYTES + in_vbytes + outputs.len() as i64 * OUTPUT_VBYTES
}
