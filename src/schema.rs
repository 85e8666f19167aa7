//! Serde models of the upstream accounting-API feeds.
//!
//! The feeds are consumed shape-only: every field the reconciliation needs is
//! modelled here, everything else is ignored. Individual malformed records
//! are dropped with a debug log instead of failing a whole feed.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::labels::ControlAccountKind;

/// Monetary amount as the feeds send it: either a bare number or an object
/// with a signed `value` and optional explicit `debit`/`credit` sub-fields.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "MoneyRepr", rename_all = "camelCase")]
pub struct MoneyValue {
    pub value: Option<f64>,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MoneyRepr {
    Scalar(f64),
    #[serde(rename_all = "camelCase")]
    Parts {
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        debit: Option<f64>,
        #[serde(default)]
        credit: Option<f64>,
    },
}

impl From<MoneyRepr> for MoneyValue {
    fn from(repr: MoneyRepr) -> Self {
        match repr {
            MoneyRepr::Scalar(value) => MoneyValue {
                value: Some(value),
                debit: None,
                credit: None,
            },
            MoneyRepr::Parts {
                value,
                debit,
                credit,
            } => MoneyValue {
                value,
                debit,
                credit,
            },
        }
    }
}

/// Custom-field values attached to an account, keyed by field identifier.
///
/// Values stay as raw JSON: dates arrive as ISO datetimes, decimals sometimes
/// as strings, and coercion is the resolver's job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomFieldBundle {
    #[serde(rename = "Dates", default)]
    pub dates: BTreeMap<String, Value>,
    #[serde(rename = "Decimals", default)]
    pub decimals: BTreeMap<String, Value>,
}

impl CustomFieldBundle {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() && self.decimals.is_empty()
    }
}

/// One row of the special-accounts (balances) feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerEntry {
    pub name: String,
    /// Raw control-account label; classify with [`LedgerEntry::kind`].
    pub control_account: String,
    pub balance: Option<MoneyValue>,
    /// Opaque external identifier, used for the per-account detail lookup.
    pub key: String,
    #[serde(rename = "CustomFields2")]
    pub custom_fields: Option<CustomFieldBundle>,
}

impl LedgerEntry {
    pub fn kind(&self) -> ControlAccountKind {
        ControlAccountKind::from_label(&self.control_account)
    }
}

/// Per-account detail form, the fallback source for investment terms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountForm {
    #[serde(rename = "CustomFields2", default)]
    pub custom_fields: CustomFieldBundle,
}

/// One row of a payment/receipt/journal feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionLine {
    /// Free-form account label to be parsed.
    pub account: String,
    pub amount: Option<MoneyValue>,
    pub debit: Option<f64>,
    pub credit: Option<f64>,
    pub date: Option<String>,
}

impl TransactionLine {
    /// Unsigned magnitude of the line, preferring the `amount.value` field.
    pub fn magnitude(&self) -> f64 {
        match self.amount.and_then(|m| m.value) {
            Some(v) if v.is_finite() => v.abs(),
            _ => self.debit_amount().max(self.credit_amount()),
        }
    }

    /// Debit side of the line; line-level field wins over the amount object.
    pub fn debit_amount(&self) -> f64 {
        finite_or_zero(self.debit.or_else(|| self.amount.and_then(|m| m.debit)))
    }

    /// Credit side of the line; line-level field wins over the amount object.
    pub fn credit_amount(&self) -> f64 {
        finite_or_zero(self.credit.or_else(|| self.amount.and_then(|m| m.credit)))
    }
}

fn finite_or_zero(v: Option<f64>) -> f64 {
    match v {
        Some(v) if v.is_finite() => v.abs(),
        _ => 0.0,
    }
}

/// Decodes a balances feed that is either a bare array or wrapped in a
/// `{ "specialAccounts": [...] }` envelope. Malformed rows are skipped.
pub fn entries_from_value(value: Value) -> Vec<LedgerEntry> {
    collect_rows(value, "specialAccounts")
}

/// Decodes a transaction feed that is either a bare array or wrapped in an
/// envelope under `envelope_key`. Malformed rows are skipped.
pub fn lines_from_value(value: Value, envelope_key: &str) -> Vec<TransactionLine> {
    collect_rows(value, envelope_key)
}

fn collect_rows<T: serde::de::DeserializeOwned>(value: Value, envelope_key: &str) -> Vec<T> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(envelope_key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(row) => Some(row),
            Err(err) => {
                debug!("skipping malformed feed row: {err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_money_value_from_object_and_scalar() {
        let parts: MoneyValue = serde_json::from_value(json!({
            "value": -500.0, "credit": 500.0
        }))
        .unwrap();
        assert_eq!(parts.value, Some(-500.0));
        assert_eq!(parts.credit, Some(500.0));
        assert_eq!(parts.debit, None);

        let scalar: MoneyValue = serde_json::from_value(json!(120.5)).unwrap();
        assert_eq!(scalar.value, Some(120.5));
    }

    #[test]
    fn test_ledger_entry_kind() {
        let entry: LedgerEntry = serde_json::from_value(json!({
            "name": "Jamal Uddin",
            "controlAccount": "Loans payable",
            "balance": { "value": -100000.0 },
            "key": "abc-123"
        }))
        .unwrap();
        assert_eq!(entry.kind(), ControlAccountKind::PrincipalLiability);
    }

    #[test]
    fn test_feed_envelope_and_bare_array() {
        let wrapped = json!({ "paymentLines": [ { "account": "Dividend payable - A", "amount": { "value": 10.0 } } ] });
        let lines = lines_from_value(wrapped, "paymentLines");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].account, "Dividend payable - A");

        let bare = json!([ { "account": "Loans payable - B", "amount": 25.0 } ]);
        let lines = lines_from_value(bare, "paymentLines");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].magnitude(), 25.0);
    }

    #[test]
    fn test_malformed_row_is_skipped_not_fatal() {
        let feed = json!([
            { "account": "Loans payable - B", "amount": { "value": 10.0 } },
            { "account": 42, "amount": "broken" },
            { "account": "Loans payable - C", "amount": { "value": 20.0 } }
        ]);
        let lines = lines_from_value(feed, "receiptLines");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_line_side_helpers() {
        let line: TransactionLine = serde_json::from_value(json!({
            "account": "Profit payable - A",
            "debit": 150.0
        }))
        .unwrap();
        assert_eq!(line.debit_amount(), 150.0);
        assert_eq!(line.credit_amount(), 0.0);
        assert_eq!(line.magnitude(), 150.0);
    }
}
