//! Conversion of collaborator rows into core types.
//!
//! The shapes here mirror what the upstream stores hand back: an invoice
//! table with human-readable column names, a per-entity summary whose fields
//! are all nullable, and a monthly table. Nullable means "not present", so
//! nothing in this module silently turns a missing value into a real zero
//! without recording it.

use crate::error::{MetricsError, Result};
use crate::schema::{EntityMetrics, MetricsConfig, MonthlyAggregate, Provenance, TransactionRecord};
use crate::status::{normalize_status, StatusBreakdown};
use crate::timeseries::compose_series;
use crate::utils::parse_invoice_date;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRow {
    pub id: String,

    #[serde(rename = "Client Name", default)]
    pub client_name: Option<String>,

    #[serde(rename = "Invoice Reference", default)]
    pub invoice_reference: Option<String>,

    #[serde(rename = "Invoice Amount", default)]
    pub invoice_amount: Option<f64>,

    #[serde(rename = "Paid Amount", default)]
    pub paid_amount: Option<f64>,

    #[serde(rename = "Date Invoiced", default)]
    pub date_invoiced: Option<String>,

    #[serde(rename = "No. Days taken to Pay", default)]
    pub days_to_pay: Option<f64>,

    #[serde(rename = "Payment Status", default)]
    pub payment_status: Option<String>,

    #[serde(rename = "Is Late", default)]
    pub is_late: Option<bool>,
}

impl InvoiceRow {
    pub fn into_record(self, config: &MetricsConfig) -> TransactionRecord {
        let invoice_date = match self.date_invoiced.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => match parse_invoice_date(raw) {
                Ok(date) => Some(date),
                Err(e) => {
                    warn!("Invoice {}: {}; treating date as absent", self.id, e);
                    None
                }
            },
            _ => None,
        };

        let is_late = self.is_late.unwrap_or_else(|| {
            self.days_to_pay
                .map(|days| days > config.late_after_days)
                .unwrap_or(false)
        });

        TransactionRecord {
            id: self.id,
            reference: self.invoice_reference,
            entity_name: self.client_name.unwrap_or_default(),
            invoiced_amount: self.invoice_amount,
            paid_amount: self.paid_amount,
            invoice_date,
            days_to_pay: self.days_to_pay,
            payment_status: self.payment_status,
            is_late,
        }
    }
}

pub fn convert_invoice_rows(rows: Vec<InvoiceRow>, config: &MetricsConfig) -> Vec<TransactionRecord> {
    rows.into_iter().map(|row| row.into_record(config)).collect()
}

/// Precomputed per-entity summary. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryRecord {
    pub client_name: Option<String>,
    pub total_invoiced: Option<f64>,
    pub total_paid: Option<f64>,
    pub outstanding_amount: Option<f64>,
    pub average_days_to_pay: Option<f64>,
    pub late_invoices_count: Option<u64>,
    pub late_invoices_percentage: Option<f64>,
    pub total_invoices: Option<u64>,
    pub outstanding_invoices: Option<u64>,
    pub monthly_data: Option<Value>,
    pub payment_status_breakdown: Option<Value>,
}

fn json_present(value: &Option<Value>) -> bool {
    matches!(value, Some(v) if !v.is_null())
}

impl SummaryRecord {
    pub fn has_any_field(&self) -> bool {
        self.total_invoiced.is_some()
            || self.total_paid.is_some()
            || self.outstanding_amount.is_some()
            || self.average_days_to_pay.is_some()
            || self.late_invoices_count.is_some()
            || self.late_invoices_percentage.is_some()
            || self.total_invoices.is_some()
            || self.outstanding_invoices.is_some()
            || json_present(&self.monthly_data)
            || json_present(&self.payment_status_breakdown)
    }

    /// Monthly series from `monthly_data`, empty when the blob is absent or
    /// unreadable.
    pub fn monthly_series(&self) -> Vec<MonthlyAggregate> {
        match self.monthly_data.as_ref().filter(|v| !v.is_null()) {
            Some(blob) => match parse_monthly_data(blob) {
                Ok(entries) => compose_series(entries),
                Err(e) => {
                    warn!("Ignoring unreadable monthly_data in summary: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }

    pub fn status_breakdown(&self) -> StatusBreakdown {
        match self
            .payment_status_breakdown
            .as_ref()
            .filter(|v| !v.is_null())
        {
            Some(blob) => match parse_status_breakdown(blob) {
                Ok(breakdown) => breakdown,
                Err(e) => {
                    warn!("Ignoring unreadable payment_status_breakdown in summary: {}", e);
                    StatusBreakdown::default()
                }
            },
            None => StatusBreakdown::default(),
        }
    }

    pub fn to_metrics(&self) -> EntityMetrics {
        let mut absent = Vec::new();
        let mut take = |name: &str, value: Option<f64>| -> f64 {
            value.unwrap_or_else(|| {
                absent.push(name.to_string());
                0.0
            })
        };

        let total_invoiced = take("total_invoiced", self.total_invoiced);
        let total_paid = take("total_paid", self.total_paid);
        let average_days_to_pay = take("average_days_to_pay", self.average_days_to_pay);
        let late_percentage = take("late_percentage", self.late_invoices_percentage);
        let late_count = take("late_count", self.late_invoices_count.map(|v| v as f64)) as u64;
        let total_invoices = take("total_invoices", self.total_invoices.map(|v| v as f64)) as u64;
        let outstanding_invoices = take(
            "outstanding_invoices",
            self.outstanding_invoices.map(|v| v as f64),
        ) as u64;

        let outstanding_amount = match (self.total_invoiced, self.total_paid) {
            (Some(invoiced), Some(paid)) => {
                let derived = invoiced - paid;
                if let Some(stored) = self.outstanding_amount {
                    if (stored - derived).abs() > 1e-6 {
                        debug!(
                            "Stored outstanding {} disagrees with invoiced - paid = {}; using derived value",
                            stored, derived
                        );
                    }
                }
                derived
            }
            _ => take("outstanding_amount", self.outstanding_amount),
        };

        let monthly = self.monthly_series();
        if monthly.is_empty() {
            absent.push("monthly".to_string());
        }
        let status_breakdown = self.status_breakdown();
        if status_breakdown.is_empty() {
            absent.push("status_breakdown".to_string());
        }

        EntityMetrics {
            total_invoiced,
            total_paid,
            outstanding_amount,
            average_days_to_pay,
            late_count,
            late_percentage,
            total_invoices,
            outstanding_invoices,
            status_breakdown,
            monthly,
            absent_fields: absent,
            ..EntityMetrics::empty(Provenance::Summary)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyRow {
    pub client_name: Option<String>,
    pub month: Option<String>,
    pub invoiced_amount: Option<f64>,
    pub paid_amount: Option<f64>,
}

/// Rows without a month are left out of the series.
pub fn monthly_series_from_rows(rows: &[MonthlyRow]) -> Vec<MonthlyAggregate> {
    compose_series(rows.iter().filter_map(|row| {
        let month = row.month.as_deref().filter(|m| !m.trim().is_empty());
        if month.is_none() {
            debug!("Monthly row without a month; excluded from the series");
        }
        month.map(|m| {
            (
                m,
                row.invoiced_amount.unwrap_or(0.0),
                row.paid_amount.unwrap_or(0.0),
            )
        })
    }))
}

pub fn metrics_from_monthly_rows(rows: &[MonthlyRow]) -> EntityMetrics {
    let total_invoiced: f64 = rows.iter().filter_map(|r| r.invoiced_amount).sum();
    let total_paid: f64 = rows.iter().filter_map(|r| r.paid_amount).sum();

    let absent_fields = [
        "average_days_to_pay",
        "late_count",
        "late_percentage",
        "total_invoices",
        "outstanding_invoices",
        "status_breakdown",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect();

    EntityMetrics {
        total_invoiced,
        total_paid,
        outstanding_amount: total_invoiced - total_paid,
        monthly: monthly_series_from_rows(rows),
        absent_fields,
        ..EntityMetrics::empty(Provenance::MonthlyTable)
    }
}

#[derive(Debug, Default, Deserialize)]
struct MonthlyDataBlob {
    #[serde(default)]
    monthly_invoiced: Map<String, Value>,
    #[serde(default)]
    monthly_paid: Map<String, Value>,
}

fn amount_or_zero(month: &str, field: &str, value: &Value) -> f64 {
    match value.as_f64() {
        Some(amount) => amount,
        None => {
            let issue = MetricsError::MalformedRecord {
                record_id: month.to_string(),
                field: field.to_string(),
            };
            debug!("{}; counting it as zero", issue);
            0.0
        }
    }
}

/// Reads `{"monthly_invoiced": {month: amount}, "monthly_paid": {month: amount}}`
/// into `(month, invoiced, paid)` entries in document order, invoiced months
/// first. A month present in only one map gets zero for the other.
pub fn parse_monthly_data(blob: &Value) -> Result<Vec<(String, f64, f64)>> {
    let data: MonthlyDataBlob = serde_json::from_value(blob.clone())?;

    let mut entries: Vec<(String, f64, f64)> = data
        .monthly_invoiced
        .iter()
        .map(|(month, value)| {
            let invoiced = amount_or_zero(month, "monthly_invoiced", value);
            let paid = data
                .monthly_paid
                .get(month)
                .map(|v| amount_or_zero(month, "monthly_paid", v))
                .unwrap_or(0.0);
            (month.clone(), invoiced, paid)
        })
        .collect();

    for (month, value) in &data.monthly_paid {
        if !data.monthly_invoiced.contains_key(month) {
            entries.push((
                month.clone(),
                0.0,
                amount_or_zero(month, "monthly_paid", value),
            ));
        }
    }

    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct LabeledValue {
    name: Option<String>,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BreakdownBlob {
    Labels(Map<String, Value>),
    Entries(Vec<LabeledValue>),
}

/// Reads either `{label: count}` or `[{"name": label, "value": count}]`,
/// normalizing every label and merging duplicates.
pub fn parse_status_breakdown(blob: &Value) -> Result<StatusBreakdown> {
    let parsed: BreakdownBlob = serde_json::from_value(blob.clone())?;

    let counts: Vec<_> = match parsed {
        BreakdownBlob::Labels(map) => map
            .iter()
            .filter_map(|(label, value)| {
                let count = value.as_f64();
                if count.is_none() {
                    debug!("Status '{}' has a non-numeric count; skipped", label);
                }
                count.map(|c| (normalize_status(Some(label.as_str())), c))
            })
            .collect(),
        BreakdownBlob::Entries(list) => list
            .into_iter()
            .filter_map(|entry| {
                entry
                    .value
                    .map(|c| (normalize_status(entry.name.as_deref()), c))
            })
            .collect(),
    };

    Ok(StatusBreakdown::from_counts(counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::CanonicalStatus;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_invoice_row_from_table_json() {
        let row: InvoiceRow = serde_json::from_value(json!({
            "id": "7f1c",
            "Client Name": "Acme Corp",
            "Invoice Reference": "2024-1001",
            "Invoice Amount": 1500.0,
            "Paid Amount": null,
            "Date Invoiced": "2024-01-15T00:00:00+00:00",
            "No. Days taken to Pay": 45,
            "Payment Status": "Partially Paid",
            "Is Late": null
        }))
        .unwrap();

        let record = row.into_record(&MetricsConfig::default());
        assert_eq!(record.entity_name, "Acme Corp");
        assert_eq!(record.reference.as_deref(), Some("2024-1001"));
        assert_eq!(record.paid_amount, None);
        assert_eq!(
            record.invoice_date,
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        // 45 days > 30 with no explicit flag
        assert!(record.is_late);
    }

    #[test]
    fn test_invoice_row_bad_date_is_absent() {
        let row = InvoiceRow {
            id: "x".to_string(),
            client_name: None,
            invoice_reference: None,
            invoice_amount: Some(10.0),
            paid_amount: Some(10.0),
            date_invoiced: Some("not a date".to_string()),
            days_to_pay: Some(5.0),
            payment_status: None,
            is_late: Some(true),
        };
        let record = row.into_record(&MetricsConfig::default());
        assert!(record.invoice_date.is_none());
        assert!(record.is_late);
    }

    #[test]
    fn test_empty_summary_has_no_fields() {
        assert!(!SummaryRecord::default().has_any_field());

        let only_null_json = SummaryRecord {
            monthly_data: Some(Value::Null),
            ..SummaryRecord::default()
        };
        assert!(!only_null_json.has_any_field());

        let partial = SummaryRecord {
            total_paid: Some(0.0),
            ..SummaryRecord::default()
        };
        assert!(partial.has_any_field());
    }

    #[test]
    fn test_summary_to_metrics_tracks_absent_fields() {
        let summary = SummaryRecord {
            total_invoiced: Some(1000.0),
            total_paid: Some(1200.0),
            outstanding_amount: Some(999.0),
            ..SummaryRecord::default()
        };

        let metrics = summary.to_metrics();
        assert_eq!(metrics.provenance, Provenance::Summary);
        assert_eq!(metrics.outstanding_amount, -200.0);
        assert!(metrics.absent_fields.contains(&"average_days_to_pay".to_string()));
        assert!(metrics.absent_fields.contains(&"monthly".to_string()));
        assert!(!metrics.absent_fields.contains(&"total_invoiced".to_string()));
    }

    #[test]
    fn test_summary_outstanding_falls_back_to_stored_value() {
        let summary = SummaryRecord {
            total_invoiced: Some(1000.0),
            outstanding_amount: Some(250.0),
            ..SummaryRecord::default()
        };
        let metrics = summary.to_metrics();
        assert_eq!(metrics.outstanding_amount, 250.0);
        assert!(metrics.absent_fields.contains(&"total_paid".to_string()));
    }

    #[test]
    fn test_parse_monthly_data() {
        let blob = json!({
            "monthly_invoiced": { "2024-02": 200.0, "2024-01": 100.0 },
            "monthly_paid": { "2024-01": 100.0, "2024-02": 150.0, "2024-03": 20.0 }
        });
        let series = compose_series(parse_monthly_data(&blob).unwrap());

        let keys: Vec<&str> = series.iter().map(|m| m.month_key.as_str()).collect();
        assert_eq!(keys, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(series[1].growth_rate, 100.0);
        assert_eq!(series[2].invoiced_total, 0.0);
        assert_eq!(series[2].outstanding, -20.0);
    }

    #[test]
    fn test_unrecognized_months_keep_document_order() {
        let blob = json!({
            "monthly_invoiced": { "Wk9": 1.0, "Wk10": 2.0, "Ad-hoc": 3.0 },
            "monthly_paid": { "Wk10": 1.0, "Extra": 0.5 }
        });

        let months: Vec<String> = parse_monthly_data(&blob)
            .unwrap()
            .into_iter()
            .map(|(month, _, _)| month)
            .collect();
        assert_eq!(months, vec!["Wk9", "Wk10", "Ad-hoc", "Extra"]);

        let summary = SummaryRecord {
            monthly_data: Some(blob),
            ..SummaryRecord::default()
        };
        let series = summary.monthly_series();
        let keys: Vec<&str> = series.iter().map(|m| m.month_key.as_str()).collect();
        assert_eq!(keys, vec!["Wk9", "Wk10", "Ad-hoc", "Extra"]);
        assert_eq!(series[1].outstanding, 1.0);
        assert_eq!(series[3].invoiced_total, 0.0);
    }

    #[test]
    fn test_parse_monthly_data_non_numeric_is_zero() {
        let blob = json!({ "monthly_invoiced": { "Jan": "n/a" } });
        let entries = parse_monthly_data(&blob).unwrap();
        assert_eq!(entries, vec![("Jan".to_string(), 0.0, 0.0)]);
    }

    #[test]
    fn test_parse_monthly_data_rejects_wrong_shape() {
        assert!(parse_monthly_data(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_parse_status_breakdown_merges_labels() {
        let blob = json!({ "Fully Paid": 3, "fully paid": 2, "Partially Paid": 1, "??": 1 });
        let breakdown = parse_status_breakdown(&blob).unwrap();
        assert_eq!(breakdown.get(CanonicalStatus::FullyPaid), 5.0);
        assert_eq!(breakdown.total(), 7.0);
        assert_eq!(breakdown.entries[0].status, CanonicalStatus::FullyPaid);
    }

    #[test]
    fn test_parse_status_breakdown_list_form() {
        let blob = json!([
            { "name": "Overpaid", "value": 5 },
            { "name": "Unpaid", "value": 15 }
        ]);
        let breakdown = parse_status_breakdown(&blob).unwrap();
        assert_eq!(breakdown.get(CanonicalStatus::Unpaid), 15.0);
        assert_eq!(breakdown.get(CanonicalStatus::Overpaid), 5.0);
    }

    #[test]
    fn test_monthly_rows_to_metrics() {
        let rows = vec![
            MonthlyRow {
                month: Some("2024-02".to_string()),
                invoiced_amount: Some(200.0),
                paid_amount: Some(150.0),
                ..MonthlyRow::default()
            },
            MonthlyRow {
                month: Some("2024-01".to_string()),
                invoiced_amount: Some(100.0),
                paid_amount: Some(100.0),
                ..MonthlyRow::default()
            },
            MonthlyRow {
                month: None,
                invoiced_amount: Some(5.0),
                paid_amount: None,
                ..MonthlyRow::default()
            },
        ];

        let metrics = metrics_from_monthly_rows(&rows);
        assert_eq!(metrics.provenance, Provenance::MonthlyTable);
        assert_eq!(metrics.total_invoiced, 305.0);
        assert_eq!(metrics.outstanding_amount, 55.0);
        assert_eq!(metrics.monthly.len(), 2);
        assert_eq!(metrics.monthly[0].month_key, "2024-01");
    }
}
