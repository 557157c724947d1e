use thiserror::Error;

/// Failures surfaced by the address, transaction, and PSBT codecs.
///
/// Decode failures are kept distinct so callers (and tests) can tell a
/// checksum problem from a charset or length problem.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("bech32 string length {0} outside 8..=90")]
    BadLength(usize),

    #[error("mixed case in bech32 string")]
    MixedCase,

    #[error("empty human-readable part")]
    EmptyHrp,

    #[error("human-readable part contains character outside 33..=126")]
    BadHrpChar,

    #[error("separator '1' missing or misplaced")]
    BadSeparator,

    #[error("invalid character in data part")]
    BadDataChar,

    #[error("data part shorter than version plus checksum")]
    TruncatedData,

    #[error("witness version value {0} outside 0..=31")]
    BadWitnessVersion(u8),

    #[error("checksum mismatch for the version-selected constant")]
    BadChecksum,

    #[error("non-zero or oversized residue in 5-to-8 bit regrouping")]
    BadPadding,

    #[error("witness program length {got} invalid for witness version {version}")]
    BadProgramLength { version: u8, got: usize },

    #[error("unsupported witness version {0}, only v0 and v1 are handled")]
    UnsupportedAddressType(u8),

    #[error("no configured network matches HRP {0:?}")]
    UnknownNetwork(String),

    #[error("address network does not match the configured network")]
    NetworkMismatch,

    #[error("address program does not match hash160 of the configured public key")]
    PubkeyMismatch,

    #[error("txid must be 64 hex characters")]
    BadTxid,
}
