//! Dust math and candidate filtering.

use crate::model::Utxo;

/// Admission policy applied when turning the indexed list into selection
/// candidates.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpendFilter {
    pub dust_floor: i64,
    pub allow_unconfirmed: bool,
    pub max_unconf_inputs: usize,
}

/// USD-denominated dust floor in sats: `ceil((min_usd / price) * 1e8)`.
///
/// Computed in f64 and rounded up; both operands are far below 2^53 so the
/// quotient is exact to well under a satoshi. Non-positive inputs disable
/// the USD floor entirely.
pub fn dust_from_usd(min_usd: f64, price_usd_per_btc: f64) -> i64 {
    if min_usd <= 0.0 || price_usd_per_btc <= 0.0 {
        return 0;
    }
    ((min_usd / price_usd_per_btc) * 1e8).ceil() as i64
}

/// Filter and order selection candidates.
///
/// Sorted ascending by value (stable for ties) so small outputs are
/// consolidated first. Sub-dust values are dropped; unconfirmed outputs are
/// dropped wholesale when disallowed, otherwise admitted in order up to
/// `max_unconf_inputs`.
pub fn filter_candidates(utxos: &[Utxo], filter: SpendFilter) -> Vec<Utxo> {
    let mut sorted = utxos.to_vec();
    sorted.sort_by_key(|u| u.value_sats);

    let mut unconf = 0usize;
    let mut out = Vec::with_capacity(sorted.len());
    for u in sorted {
        if u.value_sats < filter.dust_floor {
            continue;
        }
        if !u.confirmed {
            if !filter.allow_unconfirmed {
                continue;
            }
            if unconf >= filter.max_unconf_inputs {
                continue;
            }
            unconf += 1;
        }
        out.push(u);
    }
    out
}
