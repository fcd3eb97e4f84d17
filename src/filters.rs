use crate::schema::TransactionRecord;
use crate::status::{normalize_status, CanonicalStatus};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Criteria for the invoice explorer. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceFilter {
    /// Case-insensitive substring of the invoice id or reference.
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub status: Option<CanonicalStatus>,
}

impl InvoiceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn with_amount_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    pub fn with_status(mut self, status: CanonicalStatus) -> Self {
        self.status = Some(status);
        self
    }

    fn matches_search(&self, record: &TransactionRecord) -> bool {
        let needle = match self.search.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_lowercase(),
            _ => return true,
        };
        record.id.to_lowercase().contains(&needle)
            || record
                .reference
                .as_deref()
                .is_some_and(|r| r.to_lowercase().contains(&needle))
    }

    fn matches_dates(&self, record: &TransactionRecord) -> bool {
        if self.date_from.is_none() && self.date_to.is_none() {
            return true;
        }
        let Some(date) = record.invoice_date else {
            return false;
        };
        self.date_from.map_or(true, |from| date >= from)
            && self.date_to.map_or(true, |to| date <= to)
    }

    fn matches_amount(&self, record: &TransactionRecord) -> bool {
        if self.min_amount.is_none() && self.max_amount.is_none() {
            return true;
        }
        let Some(amount) = record.invoiced_amount else {
            return false;
        };
        self.min_amount.map_or(true, |min| amount >= min)
            && self.max_amount.map_or(true, |max| amount <= max)
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.matches_search(record)
            && self.matches_dates(record)
            && self.matches_amount(record)
            && self
                .status
                .map_or(true, |s| normalize_status(record.payment_status.as_deref()) == s)
    }

    /// Matching records in their original order.
    pub fn apply<'a>(&self, records: &'a [TransactionRecord]) -> Vec<&'a TransactionRecord> {
        let matched: Vec<_> = records.iter().filter(|r| self.matches(r)).collect();
        debug!(
            "Invoice filter kept {} of {} records",
            matched.len(),
            records.len()
        );
        matched
    }
}

pub fn late_records(records: &[TransactionRecord]) -> Vec<&TransactionRecord> {
    records.iter().filter(|r| r.is_late).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SortField {
    Date,
    Reference,
    Amount,
    PaidAmount,
    DaysToPay,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Ordering for the invoice explorer. Records missing the sort field go
/// last in either direction. Newest first by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for InvoiceSort {
    fn default() -> Self {
        Self {
            field: SortField::Date,
            direction: SortDirection::Descending,
        }
    }
}

fn missing_last<T>(
    a: Option<T>,
    b: Option<T>,
    direction: SortDirection,
    cmp: impl FnOnce(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => direction.apply(cmp(&x, &y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn text_key(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim().to_lowercase())
}

impl InvoiceSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Choosing the current field again flips the direction; a different
    /// field starts ascending.
    pub fn toggle(self, field: SortField) -> Self {
        if self.field == field {
            let direction = match self.direction {
                SortDirection::Ascending => SortDirection::Descending,
                SortDirection::Descending => SortDirection::Ascending,
            };
            Self { field, direction }
        } else {
            Self::new(field, SortDirection::Ascending)
        }
    }

    pub fn compare(&self, a: &TransactionRecord, b: &TransactionRecord) -> Ordering {
        let direction = self.direction;
        match self.field {
            SortField::Date => missing_last(a.invoice_date, b.invoice_date, direction, Ord::cmp),
            SortField::Reference => missing_last(
                text_key(a.reference.as_ref()),
                text_key(b.reference.as_ref()),
                direction,
                Ord::cmp,
            ),
            SortField::Amount => {
                missing_last(a.invoiced_amount, b.invoiced_amount, direction, f64::total_cmp)
            }
            SortField::PaidAmount => {
                missing_last(a.paid_amount, b.paid_amount, direction, f64::total_cmp)
            }
            SortField::DaysToPay => {
                missing_last(a.days_to_pay, b.days_to_pay, direction, f64::total_cmp)
            }
            SortField::Status => missing_last(
                text_key(a.payment_status.as_ref()),
                text_key(b.payment_status.as_ref()),
                direction,
                Ord::cmp,
            ),
        }
    }

    /// Stable: records comparing equal keep their relative order.
    pub fn sort(&self, records: &mut [&TransactionRecord]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

pub fn page_count(total_items: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_items.div_ceil(page_size)
}

/// Slices `items` into the 1-based `page`. Page 0, pages past the end and a
/// zero page size all yield an empty page.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let total_items = items.len();
    let total_pages = page_count(total_items, page_size);
    let slice: &[T] = if page == 0 || page > total_pages {
        &[]
    } else {
        let start = (page - 1) * page_size;
        let end = (start + page_size).min(total_items);
        &items[start..end]
    };

    Page {
        items: slice.to_vec(),
        page,
        page_size,
        total_items,
        total_pages,
    }
}

/// One explorer view: filter, then sort, then cut out the requested page.
pub fn explore_invoices<'a>(
    records: &'a [TransactionRecord],
    filter: &InvoiceFilter,
    sort: InvoiceSort,
    page: usize,
    page_size: usize,
) -> Page<&'a TransactionRecord> {
    let mut matched = filter.apply(records);
    sort.sort(&mut matched);
    paginate(&matched, page, page_size)
}
