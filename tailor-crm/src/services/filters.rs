//! In-memory bill filters
//!
//! Pure functions over an already-fetched bill set; no store access.

use crate::config::REASON_KEYWORDS;
use crate::database::Bill;
use std::fmt;
use std::str::FromStr;

/// Which bills the ledger view shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BillFilter {
    #[default]
    All,
    /// Completion flag set
    Completed,
    /// Reason mentions one of the fixed keywords, ignoring case
    ReasonContains(&'static str),
}

impl BillFilter {
    pub fn matches(&self, bill: &Bill) -> bool {
        match self {
            BillFilter::All => true,
            BillFilter::Completed => bill.is_completed,
            BillFilter::ReasonContains(keyword) => bill
                .completion_reason
                .as_deref()
                .is_some_and(|reason| reason.to_lowercase().contains(*keyword)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BillFilter::All => "all",
            BillFilter::Completed => "completed",
            BillFilter::ReasonContains(keyword) => *keyword,
        }
    }
}

impl fmt::Display for BillFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lenient parse: accepts the filter button names as well as the bare
/// keywords. Anything unrecognised means [`BillFilter::All`].
impl FromStr for BillFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let filter = match name.as_str() {
            "completed" | "status-complete" => BillFilter::Completed,
            "reason-complete" => BillFilter::ReasonContains("complete"),
            other => REASON_KEYWORDS
                .iter()
                .copied()
                .find(|keyword| *keyword == other)
                .map(BillFilter::ReasonContains)
                .unwrap_or(BillFilter::All),
        };
        Ok(filter)
    }
}

/// Bills matching `filter`, in their original order
pub fn apply_filter(bills: &[Bill], filter: BillFilter) -> Vec<Bill> {
    bills.iter().filter(|b| filter.matches(b)).cloned().collect()
}
