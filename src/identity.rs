//! Normalization of raw investor names into a canonical grouping identity.

use serde::{Deserialize, Serialize};

/// Phase label assigned when a raw name carries no parenthesized suffix.
pub const BASE_PHASE: &str = "Base";

/// Canonical identity derived from a raw investor label.
///
/// `base_name` is stable under superficial formatting variation (numeric-code
/// prefix, phase suffix) but distinguishes genuinely different investors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvestorIdentity {
    /// Grouping key: code prefix and all parenthetical content stripped.
    pub base_name: String,
    /// Text inside the trailing parentheses, or [`BASE_PHASE`].
    pub phase_label: String,
    /// Code stripped, phase suffix retained.
    pub display_name: String,
}

impl InvestorIdentity {
    /// True when the raw name was empty; callers treat this as "unknown" and
    /// skip or bucket separately.
    pub fn is_empty(&self) -> bool {
        self.base_name.is_empty()
    }
}

/// Splits a raw investor name into its base identity and phase variant.
///
/// A leading `"<code> - "` segment (numeric code) is discarded. A trailing
/// `"(...)"` suffix becomes the phase label; any further parenthetical
/// content is stripped from the base name.
pub fn split_variant(raw_name: &str) -> InvestorIdentity {
    let trimmed = raw_name.trim();
    if trimmed.is_empty() {
        return InvestorIdentity {
            base_name: String::new(),
            phase_label: String::new(),
            display_name: String::new(),
        };
    }

    let without_code = strip_leading_code(trimmed);

    let (stem, phase_label) = match trailing_parenthetical(without_code) {
        Some((stem, phase)) if !phase.is_empty() => (stem, phase.to_string()),
        _ => (without_code, BASE_PHASE.to_string()),
    };

    InvestorIdentity {
        base_name: strip_parentheticals(stem),
        phase_label,
        display_name: without_code.to_string(),
    }
}

fn strip_leading_code(name: &str) -> &str {
    if let Some((code, rest)) = name.split_once(" - ") {
        let code = code.trim();
        if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
            return rest.trim();
        }
    }
    name
}

fn trailing_parenthetical(name: &str) -> Option<(&str, &str)> {
    let inner = name.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    Some((&inner[..open], inner[open + 1..].trim()))
}

fn strip_parentheticals(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => result.push(c),
            _ => {}
        }
    }
    collapse_spaces(result.trim())
}

fn collapse_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for c in s.chars() {
        if c == ' ' {
            if !prev_space {
                out.push(c);
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out
}
