//! sweeper-core — offline spend planning over an indexed UTXO set.
//!
//! Pieces:
//! - model: UTXO, payment output, weighted allocation, and plan types
//! - storage: persistence boundary (`KvStore`) with an in-memory reference
//! - spendable: dust math and candidate filtering under unconfirmed policy
//! - fees: virtual-size estimation (baseline and address-type-aware)
//! - allocate: even and weighted change splitting
//! - sweeper: the `Sweeper` facade producing `TransactionPlan`s
//!
//! The core is synchronous and does no I/O beyond the `KvStore` contract.
//! Planning never signs or broadcasts: plans carry an unsigned transaction
//! and a PSBT for an external signer.

pub mod allocate;
pub mod error;
pub mod fees;
pub mod model;
pub mod spendable;
pub mod storage;
pub mod sweeper;

pub use allocate::{build_weighted_outputs, split_even};
pub use error::PlanError;
pub use fees::{estimate_tx_vbytes, estimate_tx_vbytes_detailed};
pub use model::{SpendOutput, TransactionPlan, Utxo, WeightedAddr};
pub use spendable::{dust_from_usd, filter_candidates, SpendFilter};
pub use storage::{KvStore, MemKv};
pub use sweeper::Sweeper;
