//! Network table, address construction and parsing.
//!
//! Addresses are the two witness programs this planner spends to: P2WPKH
//! (version 0, 20-byte program) and P2TR (version 1, 32-byte program).
//! The network is recovered from the HRP, the type from the decoded
//! witness version, never from the HRP alone.

use crate::bech32;
use crate::error::AddressError;
use crate::hash::hash160;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    BitcoinMainnet,
    BitcoinTestnet,
    LitecoinMainnet,
    LitecoinTestnet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Asset {
    Btc,
    Ltc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressType {
    P2wpkh,
    P2tr,
}

/// Per-network encoding parameters.
///
/// The legacy base58 version bytes are carried for completeness but the
/// planner never emits legacy addresses.
#[derive(Clone, Copy, Debug)]
pub struct NetworkConfig {
    pub bech32_hrp: &'static str,
    pub bech32m_hrp: &'static str,
    pub p2pkh_prefix: u8,
    pub p2sh_prefix: u8,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::BitcoinMainnet,
        Network::BitcoinTestnet,
        Network::LitecoinMainnet,
        Network::LitecoinTestnet,
    ];

    pub fn config(self) -> NetworkConfig {
        match self {
            Network::BitcoinMainnet => NetworkConfig {
                bech32_hrp: "bc",
                bech32m_hrp: "bc",
                p2pkh_prefix: 0x00,
                p2sh_prefix: 0x05,
            },
            Network::BitcoinTestnet => NetworkConfig {
                bech32_hrp: "tb",
                bech32m_hrp: "tb",
                p2pkh_prefix: 0x6f,
                p2sh_prefix: 0xc4,
            },
            Network::LitecoinMainnet => NetworkConfig {
                bech32_hrp: "ltc",
                bech32m_hrp: "ltc",
                p2pkh_prefix: 0x30,
                p2sh_prefix: 0x32,
            },
            Network::LitecoinTestnet => NetworkConfig {
                bech32_hrp: "tltc",
                bech32m_hrp: "tltc",
                p2pkh_prefix: 0x6f,
                p2sh_prefix: 0xc4,
            },
        }
    }

    pub fn asset(self) -> Asset {
        match self {
            Network::BitcoinMainnet | Network::BitcoinTestnet => Asset::Btc,
            Network::LitecoinMainnet | Network::LitecoinTestnet => Asset::Ltc,
        }
    }

    fn from_hrp(hrp: &str) -> Option<Network> {
        Network::ALL.into_iter().find(|n| {
            let cfg = n.config();
            hrp == cfg.bech32_hrp || hrp == cfg.bech32m_hrp
        })
    }
}

/// A decoded witness address: type, network, and raw witness program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    pub kind: AddressType,
    pub network: Network,
    pub program: Vec<u8>,
}

/// Encode a 20-byte pubkey hash as a version-0 Bech32 address.
pub fn create_p2wpkh(pubkey_hash: &[u8], network: Network) -> Result<String, AddressError> {
    if pubkey_hash.len() != 20 {
        return Err(AddressError::BadProgramLength {
            version: 0,
            got: pubkey_hash.len(),
        });
    }
    let mut data = vec![0u8];
    data.extend(bech32::convert_8_to_5(pubkey_hash));
    Ok(bech32::encode(network.config().bech32_hrp, &data))
}

/// Encode a 32-byte x-only output key as a version-1 Bech32m address.
pub fn create_p2tr(output_key: &[u8], network: Network) -> Result<String, AddressError> {
    if output_key.len() != 32 {
        return Err(AddressError::BadProgramLength {
            version: 1,
            got: output_key.len(),
        });
    }
    let mut data = vec![1u8];
    data.extend(bech32::convert_8_to_5(output_key));
    Ok(bech32::encode(network.config().bech32m_hrp, &data))
}

/// Parse a Bech32/Bech32m address string.
pub fn decode_address(addr: &str) -> Result<Address, AddressError> {
    let (hrp, data) = bech32::decode(addr)?;
    let network = Network::from_hrp(&hrp).ok_or(AddressError::UnknownNetwork(hrp))?;

    let version = data[0];
    let program = bech32::convert_5_to_8(&data[1..], false)?;
    let kind = match version {
        0 => {
            if program.len() != 20 {
                return Err(AddressError::BadProgramLength {
                    version,
                    got: program.len(),
                });
            }
            AddressType::P2wpkh
        }
        1 => {
            if program.len() != 32 {
                return Err(AddressError::BadProgramLength {
                    version,
                    got: program.len(),
                });
            }
            AddressType::P2tr
        }
        v => return Err(AddressError::UnsupportedAddressType(v)),
    };

    Ok(Address {
        kind,
        network,
        program,
    })
}

/// Check that `addr` parses, sits on `network`, and (for P2WPKH) commits to
/// `pubkey`. P2TR programs are length-checked only; the x-only key is
/// supplied externally and no tweak math happens here.
pub fn validate_address(addr: &str, pubkey: &[u8], network: Network) -> Result<(), AddressError> {
    let decoded = decode_address(addr)?;
    if decoded.network != network {
        return Err(AddressError::NetworkMismatch);
    }
    match decoded.kind {
        AddressType::P2wpkh => {
            if decoded.program != hash160(pubkey) {
                return Err(AddressError::PubkeyMismatch);
            }
        }
        AddressType::P2tr => {
            // Program length was already checked during decode.
        }
    }
    Ok(())
}

/// Derive the P2WPKH change address committed to a compressed pubkey.
pub fn derive_change_address(pubkey: &[u8], network: Network) -> Result<String, AddressError> {
    create_p2wpkh(&hash160(pubkey), network)
}

/// Derive a tagged P2WPKH deposit address; distinct tags yield distinct
/// addresses for the same key.
pub fn derive_deposit_address(
    pubkey: &[u8],
    tag: &[u8],
    network: Network,
) -> Result<String, AddressError> {
    let mut preimage = Vec::with_capacity(pubkey.len() + tag.len());
    preimage.extend_from_slice(pubkey);
    preimage.extend_from_slice(tag);
    create_p2wpkh(&hash160(&preimage), network)
}
