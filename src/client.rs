//! HTTP implementation of [`LedgerSource`] against the accounting API.
//!
//! Every request carries the API key header and a bounded timeout. Transport
//! failures, non-2xx statuses, and malformed bodies all degrade to an empty
//! stream with a warning, so the engine's fail-safe handling takes over.

use log::warn;
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

use crate::config::Config;
use crate::engine::LedgerSource;
use crate::error::Result;
use crate::schema::{
    entries_from_value, lines_from_value, AccountForm, CustomFieldBundle, LedgerEntry,
    TransactionLine,
};

const API_KEY_HEADER: &str = "X-API-KEY";
// Feeds support large page sizes; request one page big enough to avoid
// pagination loss.
const PAGE_SIZE: u32 = 10_000;

pub struct HttpLedgerSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpLedgerSource {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn get_json(&self, path: &str) -> Option<Value> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("pageSize", PAGE_SIZE)])
            .send();

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!("request to {path} failed: {err}");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("request to {path} returned status {}", response.status());
            return None;
        }

        match response.json::<Value>() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("response from {path} was not valid JSON: {err}");
                None
            }
        }
    }
}

impl LedgerSource for HttpLedgerSource {
    fn special_accounts(&self) -> Vec<LedgerEntry> {
        self.get_json("special-accounts")
            .map(entries_from_value)
            .unwrap_or_default()
    }

    fn account_form(&self, key: &str) -> Option<CustomFieldBundle> {
        let value = self.get_json(&format!("special-account-form/{key}"))?;
        match serde_json::from_value::<AccountForm>(value) {
            Ok(form) => Some(form.custom_fields),
            Err(err) => {
                warn!("account form for {key} had unexpected shape: {err}");
                None
            }
        }
    }

    fn payment_lines(&self) -> Vec<TransactionLine> {
        self.get_json("payment-lines")
            .map(|v| lines_from_value(v, "paymentLines"))
            .unwrap_or_default()
    }

    fn receipt_lines(&self) -> Vec<TransactionLine> {
        self.get_json("receipt-lines")
            .map(|v| lines_from_value(v, "receiptLines"))
            .unwrap_or_default()
    }

    fn journal_entry_lines(&self) -> Vec<TransactionLine> {
        self.get_json("journal-entry-lines")
            .map(|v| lines_from_value(v, "journalEntryLines"))
            .unwrap_or_default()
    }
}
