//! Bech32 (BIP-173) and Bech32m (BIP-350) encoding.
//!
//! Data is carried as 5-bit groups. The checksum constant is selected from
//! the witness version: version 0 strings use the Bech32 constant, version
//! 1 and above use the Bech32m constant. Encoders always emit lowercase.

use crate::error::AddressError;

pub const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

pub const BECH32_CONST: u32 = 1;
pub const BECH32M_CONST: u32 = 0x2bc8_30a3;

const GEN: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];

fn charset_index(c: u8) -> Option<u8> {
    CHARSET.iter().position(|&x| x == c).map(|i| i as u8)
}

fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &v in values {
        let b = chk >> 25;
        chk = (chk & 0x01ff_ffff) << 5 ^ u32::from(v);
        for (i, g) in GEN.iter().enumerate() {
            if (b >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

/// `[hrp >> 5 ...] ++ [0] ++ [hrp & 31 ...]` per BIP-173.
fn hrp_expand(hrp: &str) -> Vec<u8> {
    let bytes = hrp.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 2 + 1);
    out.extend(bytes.iter().map(|c| c >> 5));
    out.push(0);
    out.extend(bytes.iter().map(|c| c & 31));
    out
}

fn verify_checksum(hrp: &str, data: &[u8], constant: u32) -> bool {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    polymod(&values) == constant
}

fn create_checksum(hrp: &str, data: &[u8], constant: u32) -> [u8; 6] {
    let mut values = hrp_expand(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; 6]);
    let pm = polymod(&values) ^ constant;
    let mut checksum = [0u8; 6];
    for (i, c) in checksum.iter_mut().enumerate() {
        *c = ((pm >> (5 * (5 - i))) & 31) as u8;
    }
    checksum
}

/// Checksum constant for a witness version, per BIP-350.
pub fn checksum_constant(version: u8) -> u32 {
    if version == 0 {
        BECH32_CONST
    } else {
        BECH32M_CONST
    }
}

/// Encode 5-bit `data` (witness version first) under `hrp`.
///
/// The checksum constant is chosen from the leading version value, so the
/// same entry point serves both Bech32 and Bech32m strings.
pub fn encode(hrp: &str, data: &[u8]) -> String {
    let constant = match data.first() {
        Some(0) | None => BECH32_CONST,
        Some(_) => BECH32M_CONST,
    };
    let checksum = create_checksum(hrp, data, constant);
    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + 6);
    out.push_str(hrp);
    out.push('1');
    for &v in data.iter().chain(checksum.iter()) {
        out.push(CHARSET[v as usize] as char);
    }
    out
}

/// Decode a Bech32/Bech32m string into its HRP and 5-bit data.
///
/// The returned data includes the witness version and excludes the six
/// checksum symbols. The checksum is verified against the constant selected
/// by the version value.
pub fn decode(s: &str) -> Result<(String, Vec<u8>), AddressError> {
    if s.len() < 8 || s.len() > 90 {
        return Err(AddressError::BadLength(s.len()));
    }

    let has_lower = s.bytes().any(|c| c.is_ascii_lowercase());
    let has_upper = s.bytes().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(AddressError::MixedCase);
    }

    let s = s.to_ascii_lowercase();
    let pos = s.find('1').ok_or(AddressError::BadSeparator)?;
    if pos < 1 || pos + 7 > s.len() {
        return Err(AddressError::BadSeparator);
    }

    let hrp = &s[..pos];
    if hrp.is_empty() {
        return Err(AddressError::EmptyHrp);
    }
    if hrp.bytes().any(|c| !(33..=126).contains(&c)) {
        return Err(AddressError::BadHrpChar);
    }

    let mut data = Vec::with_capacity(s.len() - pos - 1);
    for c in s[pos + 1..].bytes() {
        data.push(charset_index(c).ok_or(AddressError::BadDataChar)?);
    }

    // At least a witness version plus the six checksum symbols.
    if data.len() < 7 {
        return Err(AddressError::TruncatedData);
    }
    let version = data[0];
    if version > 31 {
        return Err(AddressError::BadWitnessVersion(version));
    }
    if !verify_checksum(hrp, &data, checksum_constant(version)) {
        return Err(AddressError::BadChecksum);
    }

    data.truncate(data.len() - 6);
    Ok((hrp.to_string(), data))
}

/// Regroup bytes into 5-bit values, padding the final group with zero bits.
pub fn convert_8_to_5(data: &[u8]) -> Vec<u8> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(data.len() * 8 / 5 + 1);
    for &b in data {
        acc = (acc << 8) | u32::from(b);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(((acc >> bits) & 31) as u8);
        }
    }
    if bits > 0 {
        out.push(((acc << (5 - bits)) & 31) as u8);
    }
    out
}

/// Regroup 5-bit values into bytes.
///
/// With `pad` set, trailing bits are flushed zero-padded. Without it, any
/// excess-length residue or non-zero residual bits is rejected, as required
/// when decoding witness programs.
pub fn convert_5_to_8(data: &[u8], pad: bool) -> Result<Vec<u8>, AddressError> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(data.len() * 5 / 8 + 1);
    for &v in data {
        if v > 31 {
            return Err(AddressError::BadDataChar);
        }
        acc = ((acc << 5) | u32::from(v)) & 0x0fff;
        bits += 5;
        while bits >= 8 {
            bits -= 8;
            out.push(((acc >> bits) & 0xff) as u8);
        }
    }
    if pad {
        if bits > 0 {
            out.push(((acc << (8 - bits)) & 0xff) as u8);
        }
    } else if bits >= 5 || ((acc << (8 - bits)) & 0xff) != 0 {
        return Err(AddressError::BadPadding);
    }
    Ok(out)
}
