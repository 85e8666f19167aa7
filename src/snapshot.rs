//! Derived output entities: the per-investor snapshot rows and the read-time
//! views computed over them (totals, timeline, grouped reconciliation).

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::FlowTotals;
use crate::identity::split_variant;
use crate::utils::round2;

/// Absolute difference below which a computed and a reported balance are
/// considered reconciled.
pub const BALANCE_TOLERANCE: f64 = 0.01;

/// One snapshot row per raw investor label with a non-zero principal balance.
///
/// The full row set is replaced atomically on every refresh; nothing here
/// survives a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorSnapshot {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_months: Option<i32>,
    pub remaining_months: i32,
    /// Annual rate, percent.
    pub profit_percentage: f64,
    /// Current principal liability.
    pub balance: f64,
    pub monthly_profit: f64,
    /// Accrual since the start date, uncapped by the contractual term.
    pub profit_payable_to_date: f64,
    /// Raw profit-liability balance, kept as a legacy cross-check field.
    pub profit_paid: f64,
    pub dividend_paid: f64,
    /// `max(0, profit_payable_to_date - dividend_paid)`.
    pub profit_due: f64,
}

/// Aggregate totals across all snapshot rows, for the dashboard header.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotTotals {
    pub monthly_profit: f64,
    pub balance: f64,
    pub profit_payable_to_date: f64,
    pub dividend_paid: f64,
    pub profit_due: f64,
    pub average_profit_percentage: f64,
    /// `(total monthly profit * 12 * 100) / total balance` when the balance
    /// is positive, else 0.
    pub blended_annual_rate: f64,
}

pub fn totals(rows: &[InvestorSnapshot]) -> SnapshotTotals {
    let mut out = SnapshotTotals::default();
    for row in rows {
        out.monthly_profit += row.monthly_profit;
        out.balance += row.balance;
        out.profit_payable_to_date += row.profit_payable_to_date;
        out.dividend_paid += row.dividend_paid;
        out.profit_due += row.profit_due;
    }
    if !rows.is_empty() {
        let pct_sum: f64 = rows.iter().map(|r| r.profit_percentage).sum();
        out.average_profit_percentage = pct_sum / rows.len() as f64;
    }
    if out.balance > 0.0 {
        out.blended_annual_rate = out.monthly_profit * 12.0 * 100.0 / out.balance;
    }
    out
}

/// One bar of the investment timeline chart; only rows with both dates
/// present appear.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineRow {
    pub investor: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub invested_amount: f64,
}

pub fn timeline_rows(rows: &[InvestorSnapshot]) -> Vec<TimelineRow> {
    rows.iter()
        .filter_map(|row| {
            Some(TimelineRow {
                investor: row.name.clone(),
                start_date: row.start_date?,
                end_date: row.end_date?,
                invested_amount: row.balance,
            })
        })
        .collect()
}

/// Granularity of the grouped reconciliation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// One row per base identity, phases merged.
    ByInvestor,
    /// One row per (base identity, phase) pair.
    ByPhase,
}

/// Best-effort cross-check of principal flows against the reported balance,
/// grouped by normalized identity. A mismatch is a data-quality flag, never
/// an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationSummary {
    pub base_name: String,
    /// Present only for [`Grouping::ByPhase`] rows.
    pub phase_label: Option<String>,
    pub total_received: f64,
    pub principal_repaid: f64,
    pub profit_paid: f64,
    /// `total_received - principal_repaid`.
    pub computed_balance: f64,
    /// Sum of snapshot balances in the group.
    pub current_balance: f64,
    pub balance_match: bool,
}

/// Derives the grouped reconciliation view from the stored snapshot rows and
/// independently aggregated flow totals.
pub fn reconcile(
    rows: &[InvestorSnapshot],
    flows: &FlowTotals,
    grouping: Grouping,
) -> Vec<ReconciliationSummary> {
    #[derive(Default)]
    struct Group {
        total_received: f64,
        principal_repaid: f64,
        profit_paid: f64,
        current_balance: f64,
    }

    let mut groups: BTreeMap<(String, Option<String>), Group> = BTreeMap::new();

    let key_for = |raw_name: &str| -> Option<(String, Option<String>)> {
        let identity = split_variant(raw_name);
        if identity.is_empty() {
            debug!("unidentifiable investor label '{raw_name}' left out of reconciliation");
            return None;
        }
        let phase = match grouping {
            Grouping::ByInvestor => None,
            Grouping::ByPhase => Some(identity.phase_label),
        };
        Some((identity.base_name, phase))
    };

    for row in rows {
        if let Some(key) = key_for(&row.name) {
            groups.entry(key).or_default().current_balance += row.balance;
        }
    }
    for (name, amount) in &flows.total_received {
        if let Some(key) = key_for(name) {
            groups.entry(key).or_default().total_received += amount;
        }
    }
    for (name, amount) in &flows.principal_repaid {
        if let Some(key) = key_for(name) {
            groups.entry(key).or_default().principal_repaid += amount;
        }
    }
    for (name, amount) in &flows.dividend_paid {
        if let Some(key) = key_for(name) {
            groups.entry(key).or_default().profit_paid += amount;
        }
    }

    groups
        .into_iter()
        .map(|((base_name, phase_label), group)| {
            let computed_balance = round2(group.total_received - group.principal_repaid);
            ReconciliationSummary {
                base_name,
                phase_label,
                total_received: group.total_received,
                principal_repaid: group.principal_repaid,
                profit_paid: group.profit_paid,
                computed_balance,
                current_balance: group.current_balance,
                balance_match: (computed_balance - group.current_balance).abs()
                    < BALANCE_TOLERANCE,
            }
        })
        .collect()
}
