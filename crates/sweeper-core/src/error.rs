use onchain::AddressError;
use thiserror::Error;

/// Planner failures. Address and codec problems bubble up transparently
/// from the onchain layer; everything else is a policy or balance failure.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("invalid address at index {index}: {source}")]
    AddressAt {
        index: usize,
        source: AddressError,
    },

    #[error("UTXO value {value} below dust threshold {floor}")]
    DustBelowThreshold { value: i64, floor: i64 },

    #[error("unconfirmed UTXOs are not allowed")]
    UnconfirmedNotAllowed,

    #[error("unconfirmed chain depth {depth} reached the maximum {max}")]
    ChainDepthExceeded { depth: u32, max: u32 },

    #[error("no spendable UTXOs after filters")]
    NoSpendableUtxos,

    #[error("balance is not enough for outputs plus fee")]
    InsufficientFunds,

    #[error("final fee overshoots; add UTXOs or reduce outputs")]
    FinalFeeOvershoot,

    #[error("fee rate must be positive")]
    NonPositiveFeeRate,

    #[error("no outputs specified")]
    NoOutputs,

    #[error("output {index} has non-positive value {value}")]
    BadOutputValue { index: usize, value: i64 },

    #[error("outputs total must be > 0")]
    NonPositiveTotal,

    #[error("weights cannot be empty")]
    EmptyWeights,

    #[error("weight at index {0} must be > 0")]
    BadWeight(usize),

    #[error("no outputs after weighting")]
    EmptyAllocation,

    #[error("no destination addresses")]
    NoDestinations,

    #[error("unable to build even chunks")]
    EmptySplit,

    #[error("balance too low after fees for consolidation")]
    ConsolidationBelowDust,

    #[error("no change outputs in parent plan")]
    NoParentChange,

    #[error("taproot change key must be 32 bytes, got {0}")]
    BadTaprootKey(usize),

    #[error("storage backend failure: {0}")]
    Storage(String),
}
