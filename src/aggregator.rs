use crate::error::MetricsError;
use crate::schema::{
    EntityMetrics, MetricsConfig, MonthGranularity, MonthlyAggregate, Provenance, TransactionRecord,
};
use crate::status::StatusBreakdown;
use crate::timeseries::{compose_series, sort_chronologically};
use crate::utils::{round_half_up, safe_ratio, short_month_key, whole_percentage, year_month_key};
use chrono::NaiveDate;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Late-payment and days-to-pay figures for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyPaymentTrend {
    pub month_key: String,
    pub record_count: u64,
    pub late_count: u64,
    pub late_percentage: f64,
    pub average_days_to_pay: f64,
}

#[derive(Debug, Clone)]
pub struct RawAggregation {
    pub metrics: EntityMetrics,
    pub payment_trends: Vec<MonthlyPaymentTrend>,
    /// Records with a missing amount; those amounts counted as zero.
    pub malformed_records: usize,
}

impl RawAggregation {
    pub fn is_empty(&self) -> bool {
        self.metrics.total_invoices == 0
    }
}

#[derive(Default)]
struct MonthBucket {
    invoiced: f64,
    paid: f64,
    records: u64,
    late: u64,
    days: DaysToPay,
}

#[derive(Default)]
struct DaysToPay {
    sum: f64,
    count: u64,
}

impl DaysToPay {
    fn add(&mut self, days: Option<f64>) {
        if let Some(days) = days.filter(|d| d.is_finite()) {
            self.sum += days;
            self.count += 1;
        }
    }

    fn mean(&self) -> f64 {
        safe_ratio(self.sum, self.count as f64)
    }
}

pub struct RawRecordAggregator {
    granularity: MonthGranularity,
}

impl RawRecordAggregator {
    pub fn new(granularity: MonthGranularity) -> Self {
        Self { granularity }
    }

    pub fn from_config(config: &MetricsConfig) -> Self {
        Self::new(config.month_granularity)
    }

    fn month_key(&self, date: NaiveDate) -> String {
        match self.granularity {
            MonthGranularity::YearMonth => year_month_key(date),
            MonthGranularity::ShortMonth => short_month_key(date),
        }
    }

    /// Groups dated records into buckets in encounter order. Undated records
    /// are left out.
    fn bucket_by_month(&self, records: &[TransactionRecord]) -> Vec<(String, MonthBucket)> {
        let mut buckets: Vec<(String, MonthBucket)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for record in records {
            let Some(date) = record.invoice_date else {
                continue;
            };
            let key = self.month_key(date);
            let idx = *positions.entry(key.clone()).or_insert_with(|| {
                buckets.push((key, MonthBucket::default()));
                buckets.len() - 1
            });

            let bucket = &mut buckets[idx].1;
            bucket.invoiced += record.invoiced();
            bucket.paid += record.paid();
            bucket.records += 1;
            if record.is_late {
                bucket.late += 1;
            }
            bucket.days.add(record.days_to_pay);
        }

        buckets
    }

    pub fn monthly(&self, records: &[TransactionRecord]) -> Vec<MonthlyAggregate> {
        compose_series(
            self.bucket_by_month(records)
                .into_iter()
                .map(|(key, bucket)| (key, bucket.invoiced, bucket.paid)),
        )
    }

    pub fn payment_trends(&self, records: &[TransactionRecord]) -> Vec<MonthlyPaymentTrend> {
        let mut trends: Vec<MonthlyPaymentTrend> = self
            .bucket_by_month(records)
            .into_iter()
            .map(|(month_key, bucket)| MonthlyPaymentTrend {
                month_key,
                record_count: bucket.records,
                late_count: bucket.late,
                late_percentage: whole_percentage(bucket.late, bucket.records),
                average_days_to_pay: round_half_up(bucket.days.mean(), 1),
            })
            .collect();
        sort_chronologically(&mut trends, |trend| trend.month_key.as_str());
        trends
    }

    pub fn aggregate(&self, records: &[TransactionRecord]) -> RawAggregation {
        if records.is_empty() {
            return RawAggregation {
                metrics: EntityMetrics::empty(Provenance::RawRecords),
                payment_trends: Vec::new(),
                malformed_records: 0,
            };
        }

        let mut total_invoiced = 0.0;
        let mut total_paid = 0.0;
        let mut late_count = 0u64;
        let mut outstanding_invoices = 0u64;
        let mut malformed_records = 0usize;
        let mut days = DaysToPay::default();

        for record in records {
            let missing = record.missing_amounts();
            if !missing.is_empty() {
                malformed_records += 1;
                for field in missing {
                    let issue = MetricsError::MalformedRecord {
                        record_id: record.id.clone(),
                        field: field.to_string(),
                    };
                    debug!("{}; counting it as zero", issue);
                }
            }

            total_invoiced += record.invoiced();
            total_paid += record.paid();
            if record.is_late {
                late_count += 1;
            }
            if record.outstanding() > 0.0 {
                outstanding_invoices += 1;
            }
            days.add(record.days_to_pay);
        }

        let total_invoices = records.len() as u64;
        let status_breakdown =
            StatusBreakdown::from_labels(records.iter().map(|r| r.payment_status.as_deref()));

        debug!(
            "Aggregated {} raw records ({} malformed, {} undated)",
            total_invoices,
            malformed_records,
            records.iter().filter(|r| r.invoice_date.is_none()).count()
        );

        let metrics = EntityMetrics {
            total_invoiced,
            total_paid,
            outstanding_amount: total_invoiced - total_paid,
            average_days_to_pay: days.mean(),
            late_count,
            late_percentage: whole_percentage(late_count, total_invoices),
            total_invoices,
            outstanding_invoices,
            status_breakdown,
            monthly: self.monthly(records),
            ..EntityMetrics::empty(Provenance::RawRecords)
        };

        RawAggregation {
            metrics,
            payment_trends: self.payment_trends(records),
            malformed_records,
        }
    }
}
