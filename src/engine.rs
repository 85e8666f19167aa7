//! The reconciliation engine: fetches every upstream stream, folds it into
//! per-investor accumulators, derives the financial fields, and atomically
//! replaces the stored snapshot.
//!
//! Refreshes run under a process-wide lock and a minimum-interval rate
//! limit. An empty balances feed is treated as an upstream outage and leaves
//! the previous snapshot untouched.

use chrono::{Local, NaiveDate};
use log::{debug, info, warn};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::aggregate::{group_balances, FlowTotals, InvestmentTerms, PrincipalAccount};
use crate::config::Config;
use crate::error::Result;
use crate::schema::{CustomFieldBundle, LedgerEntry, TransactionLine};
use crate::snapshot::{
    reconcile, timeline_rows, totals, Grouping, InvestorSnapshot, ReconciliationSummary,
    SnapshotTotals, TimelineRow,
};
use crate::store::SnapshotStore;
use crate::utils::{
    duration_months, elapsed_months, monthly_profit, order_dates, remaining_months,
};

/// Read access to the upstream feeds.
///
/// Transport failures are recovered inside the implementation: a stream that
/// cannot be fetched comes back empty and a missing detail form comes back
/// as `None`, so the engine only ever sees data or absence.
pub trait LedgerSource: Send + Sync {
    fn special_accounts(&self) -> Vec<LedgerEntry>;

    /// Per-account detail form, the fallback source for investment terms.
    fn account_form(&self, key: &str) -> Option<CustomFieldBundle>;

    fn payment_lines(&self) -> Vec<TransactionLine>;

    fn receipt_lines(&self) -> Vec<TransactionLine>;

    fn journal_entry_lines(&self) -> Vec<TransactionLine>;
}

/// Why a refresh performed no work. Neither case is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The minimum interval since the last applied refresh has not elapsed.
    RateLimited,
    /// The balances feed returned no records; the previous snapshot is kept
    /// rather than cleared.
    EmptyUpstream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Skipped(SkipReason),
    Applied { snapshots: usize },
}

struct EngineState {
    last_applied: Option<Instant>,
}

impl EngineState {
    fn interval_elapsed(&self, interval: Duration) -> bool {
        match self.last_applied {
            Some(at) => at.elapsed() >= interval,
            None => true,
        }
    }
}

/// Owns the refresh lifecycle: one instance per deployment, holding its own
/// last-refresh state so tests can construct isolated engines.
pub struct Reconciler<S, T> {
    source: S,
    store: T,
    config: Config,
    state: Mutex<EngineState>,
}

impl<S: LedgerSource, T: SnapshotStore> Reconciler<S, T> {
    pub fn new(source: S, store: T, config: Config) -> Self {
        Self {
            source,
            store,
            config,
            state: Mutex::new(EngineState { last_applied: None }),
        }
    }

    /// Runs a refresh cycle against today's date. See [`Self::refresh_at`].
    pub fn refresh(&self, force: bool) -> Result<RefreshOutcome> {
        self.refresh_at(force, Local::now().date_naive())
    }

    /// Runs a refresh cycle, evaluating time-based derivations against
    /// `today`.
    ///
    /// Exactly one refresh executes at a time: concurrent callers block on
    /// the engine lock and re-evaluate the rate limit once they acquire it,
    /// so a burst of callers inside the interval yields one applied refresh.
    pub fn refresh_at(&self, force: bool, today: NaiveDate) -> Result<RefreshOutcome> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let interval = Duration::from_secs(self.config.update_interval_secs);
        if !force && !state.interval_elapsed(interval) {
            debug!("refresh skipped: within the minimum update interval");
            return Ok(RefreshOutcome::Skipped(SkipReason::RateLimited));
        }

        let accounts = self.source.special_accounts();
        if accounts.is_empty() {
            // No data is indistinguishable from an upstream outage, so the
            // previous snapshot stays and the timestamp does not advance.
            warn!("balances feed returned no records; keeping previous snapshot");
            return Ok(RefreshOutcome::Skipped(SkipReason::EmptyUpstream));
        }

        let payments = self.source.payment_lines();
        let receipts = self.source.receipt_lines();
        let journals = self.source.journal_entry_lines();
        debug!(
            "fetched {} accounts, {} payment, {} receipt, {} journal lines",
            accounts.len(),
            payments.len(),
            receipts.len(),
            journals.len()
        );

        let breakdown = group_balances(&accounts, &self.config.field_ids);

        let mut flows = FlowTotals::default();
        flows.add_payments(&payments);
        flows.add_receipts(&receipts);
        flows.add_journals(&journals);

        let mut rows = Vec::with_capacity(breakdown.principal.len());
        for account in &breakdown.principal {
            let mut terms = account.terms;
            if !terms.is_complete() && !account.key.is_empty() {
                if let Some(bundle) = self.source.account_form(&account.key) {
                    terms.fill_missing_from(&InvestmentTerms::from_bundle(
                        &bundle,
                        &self.config.field_ids,
                    ));
                }
            }
            let profit_paid = breakdown
                .profit_payable
                .get(&account.name)
                .copied()
                .unwrap_or(0.0);
            rows.push(build_snapshot_row(
                account,
                terms,
                flows.dividend_paid_for(&account.name),
                profit_paid,
                today,
            ));
        }

        let count = rows.len();
        self.store.replace_all(rows)?;
        state.last_applied = Some(Instant::now());
        info!("snapshot refreshed: {count} investor rows");
        Ok(RefreshOutcome::Applied { snapshots: count })
    }

    /// The stored snapshot rows as of the last applied refresh.
    pub fn snapshot(&self) -> Result<Vec<InvestorSnapshot>> {
        self.store.load_all()
    }

    /// Dashboard header totals over the stored rows.
    pub fn totals(&self) -> Result<SnapshotTotals> {
        Ok(totals(&self.store.load_all()?))
    }

    /// Timeline chart rows for investments with both dates present.
    pub fn timeline(&self) -> Result<Vec<TimelineRow>> {
        Ok(timeline_rows(&self.store.load_all()?))
    }

    /// Grouped principal reconciliation, computed on demand from the
    /// transaction feeds independently of the snapshot table.
    pub fn reconciliation(&self, grouping: Grouping) -> Result<Vec<ReconciliationSummary>> {
        let mut flows = FlowTotals::default();
        flows.add_payments(&self.source.payment_lines());
        flows.add_receipts(&self.source.receipt_lines());
        flows.add_journals(&self.source.journal_entry_lines());
        Ok(reconcile(&self.store.load_all()?, &flows, grouping))
    }
}

fn build_snapshot_row(
    account: &PrincipalAccount,
    terms: InvestmentTerms,
    dividend_paid: f64,
    profit_paid: f64,
    today: NaiveDate,
) -> InvestorSnapshot {
    let (start_date, end_date) = order_dates(terms.start_date, terms.end_date);
    let profit_percentage = terms.profit_percentage.unwrap_or(0.0);
    let monthly = monthly_profit(account.balance, profit_percentage);
    let payable = elapsed_months(start_date, today) as f64 * monthly;

    InvestorSnapshot {
        name: account.name.clone(),
        start_date,
        end_date,
        duration_months: duration_months(start_date, end_date),
        remaining_months: remaining_months(end_date, today),
        profit_percentage,
        balance: account.balance,
        monthly_profit: monthly,
        profit_payable_to_date: payable,
        profit_paid,
        dividend_paid,
        profit_due: (payable - dividend_paid).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldIds;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[derive(Default)]
    struct CannedSource {
        accounts: Vec<LedgerEntry>,
        forms: BTreeMap<String, CustomFieldBundle>,
        payments: Vec<TransactionLine>,
        receipts: Vec<TransactionLine>,
        journals: Vec<TransactionLine>,
    }

    impl LedgerSource for CannedSource {
        fn special_accounts(&self) -> Vec<LedgerEntry> {
            self.accounts.clone()
        }
        fn account_form(&self, key: &str) -> Option<CustomFieldBundle> {
            self.forms.get(key).cloned()
        }
        fn payment_lines(&self) -> Vec<TransactionLine> {
            self.payments.clone()
        }
        fn receipt_lines(&self) -> Vec<TransactionLine> {
            self.receipts.clone()
        }
        fn journal_entry_lines(&self) -> Vec<TransactionLine> {
            self.journals.clone()
        }
    }

    fn field_ids() -> FieldIds {
        FieldIds {
            start_new: "start-new".to_string(),
            end_new: "end-new".to_string(),
            profit_new: "profit-new".to_string(),
            start_legacy: "start-old".to_string(),
            end_legacy: "end-old".to_string(),
            profit_legacy: "profit-old".to_string(),
        }
    }

    fn config(interval_secs: u64) -> Config {
        Config {
            update_interval_secs: interval_secs,
            field_ids: field_ids(),
            ..Config::default()
        }
    }

    fn principal_entry(name: &str, key: &str, balance: f64) -> LedgerEntry {
        serde_json::from_value(json!({
            "name": name,
            "controlAccount": "Loans payable",
            "balance": { "value": balance },
            "key": key
        }))
        .unwrap()
    }

    #[test]
    fn test_refresh_builds_derived_fields() {
        let mut source = CannedSource::default();
        source.accounts.push(principal_entry("Jamal", "k1", -120000.0));
        source.forms.insert(
            "k1".to_string(),
            serde_json::from_value(json!({
                "Dates": {
                    "start-new": "2024-01-10T00:00:00",
                    "end-new": "2026-01-10T00:00:00"
                },
                "Decimals": { "profit-new": 12.0 }
            }))
            .unwrap(),
        );
        source.payments.push(
            serde_json::from_value(json!({
                "account": "Dividend payable - Jamal",
                "amount": { "value": 2500.0 }
            }))
            .unwrap(),
        );

        let engine = Reconciler::new(source, MemoryStore::new(), config(0));
        let outcome = engine.refresh_at(true, d(2024, 7, 1)).unwrap();
        assert_eq!(outcome, RefreshOutcome::Applied { snapshots: 1 });

        let rows = engine.snapshot().unwrap();
        let row = &rows[0];
        assert_eq!(row.balance, 120000.0);
        assert_eq!(row.duration_months, Some(24));
        assert_eq!(row.remaining_months, 18);
        assert!((row.monthly_profit - 1200.0).abs() < f64::EPSILON);
        // 6 elapsed months * 1200 = 7200 accrued, 2500 distributed.
        assert!((row.profit_payable_to_date - 7200.0).abs() < 0.01);
        assert!((row.dividend_paid - 2500.0).abs() < 0.01);
        assert!((row.profit_due - 4700.0).abs() < 0.01);
    }

    #[test]
    fn test_entry_terms_win_over_detail_form() {
        let mut source = CannedSource::default();
        let mut entry = principal_entry("Jamal", "k1", -50000.0);
        entry.custom_fields = Some(
            serde_json::from_value(json!({
                "Dates": { "start-new": "2024-03-01T00:00:00" },
                "Decimals": {}
            }))
            .unwrap(),
        );
        source.accounts.push(entry);
        source.forms.insert(
            "k1".to_string(),
            serde_json::from_value(json!({
                "Dates": {
                    "start-old": "1999-01-01T00:00:00",
                    "end-old": "2025-03-01T00:00:00"
                },
                "Decimals": { "profit-old": 10.0 }
            }))
            .unwrap(),
        );

        let engine = Reconciler::new(source, MemoryStore::new(), config(0));
        engine.refresh_at(true, d(2024, 6, 1)).unwrap();

        let rows = engine.snapshot().unwrap();
        let row = &rows[0];
        // Entry-level start date survives; gaps came from the form.
        assert_eq!(row.start_date, Some(d(2024, 3, 1)));
        assert_eq!(row.end_date, Some(d(2025, 3, 1)));
        assert_eq!(row.profit_percentage, 10.0);
    }

    #[test]
    fn test_swapped_dates_are_corrected() {
        let mut source = CannedSource::default();
        let mut entry = principal_entry("Karim", "k2", -10000.0);
        entry.custom_fields = Some(
            serde_json::from_value(json!({
                "Dates": {
                    "start-new": "2025-06-01T00:00:00",
                    "end-new": "2023-06-01T00:00:00"
                },
                "Decimals": { "profit-new": 6.0 }
            }))
            .unwrap(),
        );
        source.accounts.push(entry);

        let engine = Reconciler::new(source, MemoryStore::new(), config(0));
        engine.refresh_at(true, d(2024, 6, 1)).unwrap();

        let row = &engine.snapshot().unwrap()[0];
        assert_eq!(row.start_date, Some(d(2023, 6, 1)));
        assert_eq!(row.end_date, Some(d(2025, 6, 1)));
        assert_eq!(row.duration_months, Some(24));
        assert!(row.remaining_months >= 0);
        assert!(row.profit_due >= 0.0);
    }

    #[test]
    fn test_empty_upstream_keeps_previous_snapshot() {
        let mut source = CannedSource::default();
        source.accounts.push(principal_entry("Jamal", "k1", -500.0));
        let engine = Reconciler::new(source, MemoryStore::new(), config(3600));
        engine.refresh_at(true, d(2024, 6, 1)).unwrap();
        assert_eq!(engine.snapshot().unwrap().len(), 1);

        let empty_engine = Reconciler::new(CannedSource::default(), MemoryStore::new(), config(0));
        let outcome = empty_engine.refresh_at(true, d(2024, 6, 1)).unwrap();
        assert_eq!(outcome, RefreshOutcome::Skipped(SkipReason::EmptyUpstream));
    }

    #[test]
    fn test_rate_limit_skips_until_forced() {
        let mut source = CannedSource::default();
        source.accounts.push(principal_entry("Jamal", "k1", -500.0));
        let engine = Reconciler::new(source, MemoryStore::new(), config(3600));

        let first = engine.refresh_at(false, d(2024, 6, 1)).unwrap();
        assert!(matches!(first, RefreshOutcome::Applied { .. }));

        let second = engine.refresh_at(false, d(2024, 6, 1)).unwrap();
        assert_eq!(second, RefreshOutcome::Skipped(SkipReason::RateLimited));

        let forced = engine.refresh_at(true, d(2024, 6, 1)).unwrap();
        assert!(matches!(forced, RefreshOutcome::Applied { .. }));
    }

    #[test]
    fn test_missing_terms_default_to_zero_rate_and_no_dates() {
        let mut source = CannedSource::default();
        source.accounts.push(principal_entry("Unknown", "", -900.0));
        let engine = Reconciler::new(source, MemoryStore::new(), config(0));
        engine.refresh_at(true, d(2024, 6, 1)).unwrap();

        let row = &engine.snapshot().unwrap()[0];
        assert_eq!(row.start_date, None);
        assert_eq!(row.duration_months, None);
        assert_eq!(row.remaining_months, 0);
        assert_eq!(row.monthly_profit, 0.0);
        assert_eq!(row.profit_due, 0.0);
    }
}
