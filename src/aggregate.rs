//! Folding of raw upstream records into per-investor accumulators.
//!
//! One aggregator per feed: balances seed the snapshot rows, payment,
//! receipt, and journal lines accumulate the distribution and principal
//! flows. A malformed or unmatched record is skipped on its own; it never
//! aborts the pass.

use chrono::NaiveDate;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::FieldIds;
use crate::labels::{
    parse_account_label, parse_with_prefixes, ControlAccountKind, DISTRIBUTION_PREFIXES,
    PREFIX_PRINCIPAL,
};
use crate::schema::{CustomFieldBundle, LedgerEntry, TransactionLine};
use crate::utils::{extract_balance, parse_date};

/// Investment terms of one principal account, from whichever source supplied
/// them first.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InvestmentTerms {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub profit_percentage: Option<f64>,
}

impl InvestmentTerms {
    pub fn is_complete(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_some() && self.profit_percentage.is_some()
    }

    /// Fills gaps from `other` without overwriting anything already present.
    pub fn fill_missing_from(&mut self, other: &InvestmentTerms) {
        if self.start_date.is_none() {
            self.start_date = other.start_date;
        }
        if self.end_date.is_none() {
            self.end_date = other.end_date;
        }
        if self.profit_percentage.is_none() {
            self.profit_percentage = other.profit_percentage;
        }
    }

    pub fn from_bundle(bundle: &CustomFieldBundle, field_ids: &FieldIds) -> Self {
        Self {
            start_date: resolve_date_field(bundle, &field_ids.start_sources()),
            end_date: resolve_date_field(bundle, &field_ids.end_sources()),
            profit_percentage: resolve_decimal_field(bundle, &field_ids.profit_sources()),
        }
    }
}

/// Returns the first date the ordered field identifiers resolve to.
///
/// Date values arrive as ISO datetimes; everything from `T` on is dropped
/// before the strict date parse.
pub fn resolve_date_field(bundle: &CustomFieldBundle, ids: &[&str]) -> Option<NaiveDate> {
    ids.iter()
        .filter(|id| !id.is_empty())
        .find_map(|id| bundle.dates.get(*id).and_then(date_from_value))
}

/// Returns the first decimal the ordered field identifiers resolve to.
pub fn resolve_decimal_field(bundle: &CustomFieldBundle, ids: &[&str]) -> Option<f64> {
    ids.iter()
        .filter(|id| !id.is_empty())
        .find_map(|id| bundle.decimals.get(*id).and_then(decimal_from_value))
}

fn date_from_value(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?;
    let date_part = text.split('T').next().unwrap_or_default().trim();
    if date_part.is_empty() {
        return None;
    }
    parse_date(date_part)
}

fn decimal_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// One non-zero principal-liability account, seeded from the balances feed.
#[derive(Debug, Clone)]
pub struct PrincipalAccount {
    /// Raw investor label, carried through to the snapshot untouched.
    pub name: String,
    pub key: String,
    pub balance: f64,
    /// Terms found on the entry itself; gaps are filled later from the
    /// per-key detail lookup.
    pub terms: InvestmentTerms,
}

/// Output of the balances feed, grouped by control-account kind.
#[derive(Debug, Clone, Default)]
pub struct BalanceBreakdown {
    pub principal: Vec<PrincipalAccount>,
    /// Raw profit-liability balance per investor name, kept as a legacy
    /// cross-check field.
    pub profit_payable: BTreeMap<String, f64>,
}

/// Groups ledger entries by control-account kind. Principal rows with a zero
/// balance are dropped; everything unclassified is ignored.
pub fn group_balances(entries: &[LedgerEntry], field_ids: &FieldIds) -> BalanceBreakdown {
    let mut breakdown = BalanceBreakdown::default();

    for entry in entries {
        match entry.kind() {
            ControlAccountKind::PrincipalLiability => {
                let balance = extract_balance(entry.balance.as_ref());
                if balance == 0.0 {
                    debug!("dropping zero-balance principal account '{}'", entry.name);
                    continue;
                }
                let terms = entry
                    .custom_fields
                    .as_ref()
                    .map(|bundle| InvestmentTerms::from_bundle(bundle, field_ids))
                    .unwrap_or_default();
                breakdown.principal.push(PrincipalAccount {
                    name: entry.name.clone(),
                    key: entry.key.clone(),
                    balance,
                    terms,
                });
            }
            ControlAccountKind::ProfitLiability => {
                let payable = extract_balance(entry.balance.as_ref());
                *breakdown
                    .profit_payable
                    .entry(entry.name.clone())
                    .or_insert(0.0) += payable;
            }
            ControlAccountKind::Other => {}
        }
    }

    breakdown
}

/// Per-investor flow totals accumulated from the transaction feeds.
#[derive(Debug, Clone, Default)]
pub struct FlowTotals {
    /// Matched profit-distribution amounts.
    pub dividend_paid: BTreeMap<String, f64>,
    /// Principal paid back out to investors.
    pub principal_repaid: BTreeMap<String, f64>,
    /// Principal received from investors.
    pub total_received: BTreeMap<String, f64>,
}

impl FlowTotals {
    /// Payment lines: money going out. Distribution accounts accumulate into
    /// `dividend_paid`, principal accounts into `principal_repaid`.
    pub fn add_payments(&mut self, lines: &[TransactionLine]) {
        for line in lines {
            if let Some(name) = parse_with_prefixes(&line.account, &DISTRIBUTION_PREFIXES) {
                *self.dividend_paid.entry(name).or_insert(0.0) += line.magnitude();
            } else if let Some(name) = parse_account_label(&line.account, PREFIX_PRINCIPAL) {
                *self.principal_repaid.entry(name).or_insert(0.0) += line.magnitude();
            } else {
                debug!("payment line '{}' matched no expected prefix", line.account);
            }
        }
    }

    /// Receipt lines: money coming in against a principal account counts as
    /// received investment.
    pub fn add_receipts(&mut self, lines: &[TransactionLine]) {
        for line in lines {
            if let Some(name) = parse_account_label(&line.account, PREFIX_PRINCIPAL) {
                *self.total_received.entry(name).or_insert(0.0) += line.magnitude();
            } else {
                debug!("receipt line '{}' matched no expected prefix", line.account);
            }
        }
    }

    /// Journal lines carry signed debit/credit: a debit on a profit-liability
    /// account is a distribution; on a principal account a credit increases
    /// received principal and a debit repays it.
    pub fn add_journals(&mut self, lines: &[TransactionLine]) {
        for line in lines {
            if let Some(name) = parse_with_prefixes(&line.account, &DISTRIBUTION_PREFIXES) {
                let debit = line.debit_amount();
                if debit > 0.0 {
                    *self.dividend_paid.entry(name).or_insert(0.0) += debit;
                }
            } else if let Some(name) = parse_account_label(&line.account, PREFIX_PRINCIPAL) {
                let credit = line.credit_amount();
                if credit > 0.0 {
                    *self.total_received.entry(name.clone()).or_insert(0.0) += credit;
                }
                let debit = line.debit_amount();
                if debit > 0.0 {
                    *self.principal_repaid.entry(name).or_insert(0.0) += debit;
                }
            } else {
                debug!("journal line '{}' matched no expected prefix", line.account);
            }
        }
    }

    pub fn dividend_paid_for(&self, name: &str) -> f64 {
        self.dividend_paid.get(name).copied().unwrap_or(0.0)
    }
}
