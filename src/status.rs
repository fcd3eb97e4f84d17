use crate::utils::{round_half_up, safe_ratio};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum CanonicalStatus {
    FullyPaid,
    PartiallyPaid,
    Unpaid,
    Overpaid,
    Overdue,
    Paid,
    Unknown,
}

impl CanonicalStatus {
    pub const ALL: [CanonicalStatus; 7] = [
        CanonicalStatus::FullyPaid,
        CanonicalStatus::PartiallyPaid,
        CanonicalStatus::Unpaid,
        CanonicalStatus::Overpaid,
        CanonicalStatus::Overdue,
        CanonicalStatus::Paid,
        CanonicalStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::FullyPaid => "FullyPaid",
            CanonicalStatus::PartiallyPaid => "PartiallyPaid",
            CanonicalStatus::Unpaid => "Unpaid",
            CanonicalStatus::Overpaid => "Overpaid",
            CanonicalStatus::Overdue => "Overdue",
            CanonicalStatus::Paid => "Paid",
            CanonicalStatus::Unknown => "Unknown",
        }
    }

    /// Exact (case-sensitive) match on a canonical name.
    pub fn from_canonical_name(label: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == label)
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the classification table. Matches a lower-cased label that
/// contains every `all_of` fragment and none of the `none_of` fragments.
#[derive(Debug, Clone, Copy)]
pub struct StatusRule {
    pub all_of: &'static [&'static str],
    pub none_of: &'static [&'static str],
    pub status: CanonicalStatus,
}

impl StatusRule {
    pub fn matches(&self, lowered: &str) -> bool {
        self.all_of.iter().all(|fragment| lowered.contains(fragment))
            && !self.none_of.iter().any(|fragment| lowered.contains(fragment))
    }
}

/// Evaluated top to bottom; the first matching rule wins.
pub const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        all_of: &["fully", "paid"],
        none_of: &[],
        status: CanonicalStatus::FullyPaid,
    },
    StatusRule {
        all_of: &["partial"],
        none_of: &[],
        status: CanonicalStatus::PartiallyPaid,
    },
    StatusRule {
        all_of: &["over", "paid"],
        none_of: &[],
        status: CanonicalStatus::Overpaid,
    },
    StatusRule {
        all_of: &["overdue"],
        none_of: &[],
        status: CanonicalStatus::Overdue,
    },
    // "unpaid" contains "paid" but is not a payment.
    StatusRule {
        all_of: &["paid"],
        none_of: &["unpaid"],
        status: CanonicalStatus::Paid,
    },
];

/// Maps a free-text payment status to its canonical category.
///
/// Canonical names (`"FullyPaid"`, `"Unpaid"`, ...) map to themselves, so
/// normalizing twice is a no-op. Everything else goes through [`STATUS_RULES`];
/// labels that match no rule, and absent labels, become [`CanonicalStatus::Unknown`].
pub fn normalize_status(label: Option<&str>) -> CanonicalStatus {
    let Some(label) = label else {
        return CanonicalStatus::Unknown;
    };

    let trimmed = label.trim();
    if let Some(status) = CanonicalStatus::from_canonical_name(trimmed) {
        return status;
    }

    let lowered = trimmed.to_lowercase();
    STATUS_RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.status)
        .unwrap_or(CanonicalStatus::Unknown)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum BreakdownUnit {
    Count,
    Percentage,
}

impl Default for BreakdownUnit {
    fn default() -> Self {
        Self::Count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusEntry {
    pub status: CanonicalStatus,
    pub value: f64,
}

/// Canonical status to count (or percentage), sorted by value descending with
/// ties broken by canonical name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusBreakdown {
    pub entries: Vec<StatusEntry>,
    pub unit: BreakdownUnit,
}

impl StatusBreakdown {
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (CanonicalStatus, f64)>,
    {
        let mut merged: BTreeMap<CanonicalStatus, f64> = BTreeMap::new();
        for (status, value) in counts {
            *merged.entry(status).or_insert(0.0) += value;
        }

        let mut entries: Vec<StatusEntry> = merged
            .into_iter()
            .map(|(status, value)| StatusEntry { status, value })
            .collect();
        sort_entries(&mut entries);

        Self {
            entries,
            unit: BreakdownUnit::Count,
        }
    }

    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        Self::from_counts(
            labels
                .into_iter()
                .map(|label| (normalize_status(label), 1.0)),
        )
    }

    /// Sums values of identical categories and re-sorts.
    ///
    /// Breakdowns in different units cannot be summed directly. Both sides
    /// are then turned into shares first and the result is a percentage
    /// breakdown in which each side weighs equally.
    pub fn merge(&self, other: &StatusBreakdown) -> StatusBreakdown {
        if self.unit != other.unit {
            debug!(
                "Merging {:?} breakdown with {:?} breakdown as percentages",
                self.unit, other.unit
            );
            return self
                .to_percentages()
                .merge(&other.to_percentages())
                .to_percentages();
        }

        let combined = self
            .entries
            .iter()
            .chain(other.entries.iter())
            .map(|entry| (entry.status, entry.value));

        let mut merged = Self::from_counts(combined);
        merged.unit = self.unit;
        merged
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|entry| entry.value).sum()
    }

    pub fn get(&self, status: CanonicalStatus) -> f64 {
        self.entries
            .iter()
            .find(|entry| entry.status == status)
            .map(|entry| entry.value)
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Each value as a share of the total, one decimal. A zero total yields
    /// an empty breakdown.
    pub fn to_percentages(&self) -> StatusBreakdown {
        let total = self.total();
        if total == 0.0 {
            return StatusBreakdown {
                entries: Vec::new(),
                unit: BreakdownUnit::Percentage,
            };
        }

        let mut entries: Vec<StatusEntry> = self
            .entries
            .iter()
            .map(|entry| StatusEntry {
                status: entry.status,
                value: round_half_up(safe_ratio(entry.value, total) * 100.0, 1),
            })
            .collect();
        sort_entries(&mut entries);

        StatusBreakdown {
            entries,
            unit: BreakdownUnit::Percentage,
        }
    }
}

fn sort_entries(entries: &mut [StatusEntry]) {
    entries.sort_by(|a, b| {
        b.value
            .total_cmp(&a.value)
            .then_with(|| a.status.as_str().cmp(b.status.as_str()))
    });
}
