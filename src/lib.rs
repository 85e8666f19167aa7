//! # Investor Reconciler
//!
//! A library for reconciling investor financial records pulled from an
//! accounting API into a locally queryable snapshot with derived metrics
//! (accrued profit, remaining term, amounts due).
//!
//! ## Core Concepts
//!
//! - **Ledger entries**: special-account balance rows, classified by
//!   control-account kind (principal liability, profit liability)
//! - **Transaction lines**: payment/receipt/journal rows whose free-form
//!   account labels are parsed back to an investor name
//! - **Identity**: raw labels normalize to a base name plus an investment
//!   "phase" (a parenthesized tranche suffix)
//! - **Snapshot**: the complete per-investor derived row set, replaced
//!   atomically on every refresh
//! - **Reconciliation**: a best-effort cross-check of principal flows
//!   against reported balances, grouped by normalized identity
//!
//! ## Example
//!
//! ```rust,ignore
//! use investor_reconciler::*;
//!
//! let config = Config::from_env();
//! let source = HttpLedgerSource::new(&config)?;
//! let engine = Reconciler::new(source, MemoryStore::new(), config);
//!
//! match engine.refresh(false)? {
//!     RefreshOutcome::Applied { snapshots } => println!("{snapshots} rows"),
//!     RefreshOutcome::Skipped(reason) => println!("skipped: {reason:?}"),
//! }
//!
//! let header = engine.totals()?;
//! println!("due: {}", format_currency(header.profit_due));
//! ```

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod labels;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod utils;

#[cfg(feature = "http")]
pub mod client;

pub use aggregate::{
    group_balances, resolve_date_field, resolve_decimal_field, BalanceBreakdown, FlowTotals,
    InvestmentTerms, PrincipalAccount,
};
pub use config::{Config, FieldIds};
pub use engine::{LedgerSource, Reconciler, RefreshOutcome, SkipReason};
pub use error::{ReconcileError, Result};
pub use identity::{split_variant, InvestorIdentity, BASE_PHASE};
pub use labels::{
    parse_account_label, parse_with_prefixes, ControlAccountKind, DISTRIBUTION_PREFIXES,
    PREFIX_DIVIDEND, PREFIX_PRINCIPAL, PREFIX_PROFIT,
};
pub use schema::{
    entries_from_value, lines_from_value, AccountForm, CustomFieldBundle, LedgerEntry, MoneyValue,
    TransactionLine,
};
pub use snapshot::{
    reconcile, timeline_rows, totals, Grouping, InvestorSnapshot, ReconciliationSummary,
    SnapshotTotals, TimelineRow, BALANCE_TOLERANCE,
};
pub use store::{MemoryStore, SnapshotStore};
pub use utils::*;

#[cfg(feature = "http")]
pub use client::HttpLedgerSource;
