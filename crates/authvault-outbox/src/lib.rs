//! Write-behind outbox: a `Ledger` of pending cold-tier writes plus a
//! `Reconciler` task that drains it (spec.md §4.5).

pub mod ledger;
pub mod reconciler;

pub use ledger::{InMemoryLedger, Ledger, LedgerStats};
pub use reconciler::{Reconciler, ReconcilerConfig};
