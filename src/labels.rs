//! Parsing of free-form ledger account labels.
//!
//! Upstream labels are inconsistently formatted ("Loans payable - Name",
//! "Loans payable — Name (P2)"), so investor names are recovered with a
//! rightmost-separator heuristic that tolerates names containing hyphens.

/// Control-account classification of a ledger entry, resolved once from the
/// raw label instead of re-matching strings at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAccountKind {
    /// Capital owed back to an investor ("Loans payable").
    PrincipalLiability,
    /// Accrued, unpaid profit owed to an investor ("Profit payable").
    ProfitLiability,
    Other,
}

impl ControlAccountKind {
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "loans payable" => ControlAccountKind::PrincipalLiability,
            "profit payable" => ControlAccountKind::ProfitLiability,
            _ => ControlAccountKind::Other,
        }
    }
}

/// Account-label prefix for principal (loan) liability lines.
pub const PREFIX_PRINCIPAL: &str = "Loans payable";
/// Account-label prefix for accrued-profit liability lines.
pub const PREFIX_PROFIT: &str = "Profit payable";
/// Account-label prefix for dividend/distribution liability lines.
pub const PREFIX_DIVIDEND: &str = "Dividend payable";

/// Prefixes that identify a profit-distribution account, in match priority.
pub const DISTRIBUTION_PREFIXES: [&str; 2] = [PREFIX_DIVIDEND, PREFIX_PROFIT];

// Em dash, en dash, plain hyphen, in priority order: a label using a dash
// variant splits on it even when the name itself contains hyphens.
const SEPARATORS: [char; 3] = ['\u{2014}', '\u{2013}', '-'];

/// Extracts the investor name from an account label, provided the label
/// starts with `expected_prefix` (case-insensitive, after trimming).
///
/// The name is the trimmed text after the rightmost occurrence of the
/// highest-priority separator present in the label. Returns `None` when the
/// prefix does not match, no separator exists, or nothing follows it.
pub fn parse_account_label(label: &str, expected_prefix: &str) -> Option<String> {
    let label = label.trim();
    if !label
        .to_lowercase()
        .starts_with(&expected_prefix.trim().to_lowercase())
    {
        return None;
    }

    let separator = SEPARATORS.iter().find(|sep| label.contains(**sep))?;
    let idx = label.rfind(*separator)?;
    let name = label[idx + separator.len_utf8()..].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Tries `parse_account_label` against each prefix in order, returning the
/// first match.
pub fn parse_with_prefixes(label: &str, prefixes: &[&str]) -> Option<String> {
    prefixes
        .iter()
        .find_map(|prefix| parse_account_label(label, prefix))
}
