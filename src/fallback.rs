//! Placeholder figures shown when no tier has data for an entity.
//!
//! The numbers are fixed demo values and must always be presented as such;
//! every value produced here carries [`MetricsStatus::FallbackUsed`].

use crate::aggregator::MonthlyPaymentTrend;
use crate::schema::{EntityMetrics, MetricsStatus, MonthlyAggregate, Provenance};
use crate::status::{CanonicalStatus, StatusBreakdown};
use crate::timeseries::compose_series;

pub const FALLBACK_AVERAGE_DAYS_TO_PAY: f64 = 28.5;

const FALLBACK_MONTHS: [(&str, f64, f64); 7] = [
    ("Jan", 4000.0, 3400.0),
    ("Feb", 3000.0, 2800.0),
    ("Mar", 2000.0, 1800.0),
    ("Apr", 2780.0, 2500.0),
    ("May", 1890.0, 1700.0),
    ("Jun", 2390.0, 2000.0),
    ("Jul", 3490.0, 3000.0),
];

/// Share of invoices per status, in percent.
const FALLBACK_STATUS_SHARES: [(CanonicalStatus, f64); 4] = [
    (CanonicalStatus::FullyPaid, 65.0),
    (CanonicalStatus::PartiallyPaid, 15.0),
    (CanonicalStatus::Unpaid, 15.0),
    (CanonicalStatus::Overpaid, 5.0),
];

/// (month, late percentage, average days to pay)
const FALLBACK_TRENDS: [(&str, f64, f64); 7] = [
    ("Jan", 25.0, 32.0),
    ("Feb", 18.0, 28.0),
    ("Mar", 22.0, 31.0),
    ("Apr", 15.0, 27.0),
    ("May", 20.0, 25.0),
    ("Jun", 17.0, 29.0),
    ("Jul", 12.0, 23.0),
];

pub fn fallback_payment_trends() -> Vec<MonthlyPaymentTrend> {
    FALLBACK_TRENDS
        .iter()
        .map(|&(month, late_percentage, average_days_to_pay)| MonthlyPaymentTrend {
            month_key: month.to_string(),
            record_count: 0,
            late_count: 0,
            late_percentage,
            average_days_to_pay,
        })
        .collect()
}

pub fn fallback_monthly() -> Vec<MonthlyAggregate> {
    compose_series(FALLBACK_MONTHS)
}

pub fn fallback_status_breakdown() -> StatusBreakdown {
    StatusBreakdown::from_counts(FALLBACK_STATUS_SHARES).to_percentages()
}

/// Totals are the sums of the fallback months so the series and the
/// headline figures agree.
pub fn fallback_metrics() -> EntityMetrics {
    let (total_invoiced, total_paid) = FALLBACK_MONTHS
        .iter()
        .fold((0.0, 0.0), |(invoiced, paid), &(_, i, p)| (invoiced + i, paid + p));

    EntityMetrics {
        total_invoiced,
        total_paid,
        outstanding_amount: total_invoiced - total_paid,
        average_days_to_pay: FALLBACK_AVERAGE_DAYS_TO_PAY,
        late_count: 0,
        late_percentage: 0.0,
        total_invoices: 0,
        outstanding_invoices: 0,
        status_breakdown: fallback_status_breakdown(),
        monthly: fallback_monthly(),
        provenance: Provenance::Fallback,
        status: MetricsStatus::FallbackUsed,
        absent_fields: Vec::new(),
    }
}
