//! Append-only record of live fetch attempts.

pub mod ledger;

pub use ledger::{FetchEvent, FetchLedger, LedgerSummary};
