use crate::error::{MetricsError, Result};
use crate::status::StatusBreakdown;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The business or client whose receivables are being analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    pub id: String,
    pub name: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransactionRecord {
    pub id: String,

    #[serde(default)]
    #[schemars(description = "Human-facing invoice reference, e.g. '2024-1001'")]
    pub reference: Option<String>,

    pub entity_name: String,

    #[schemars(description = "Amount invoiced. Absent values contribute zero to every total.")]
    pub invoiced_amount: Option<f64>,

    #[schemars(description = "Amount paid so far. Absent values contribute zero to every total.")]
    pub paid_amount: Option<f64>,

    #[schemars(
        description = "Invoice date. Records without one still count toward entity totals but not toward any month."
    )]
    pub invoice_date: Option<NaiveDate>,

    #[schemars(description = "Days taken to pay. Absent values are excluded from the average.")]
    pub days_to_pay: Option<f64>,

    #[schemars(description = "Free-text payment status label as captured upstream")]
    pub payment_status: Option<String>,

    #[serde(default)]
    pub is_late: bool,
}

impl TransactionRecord {
    pub fn invoiced(&self) -> f64 {
        self.invoiced_amount.unwrap_or(0.0)
    }

    pub fn paid(&self) -> f64 {
        self.paid_amount.unwrap_or(0.0)
    }

    pub fn outstanding(&self) -> f64 {
        self.invoiced() - self.paid()
    }

    /// Names of numeric fields that were missing on this record.
    pub fn missing_amounts(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.invoiced_amount.is_none() {
            missing.push("invoiced_amount");
        }
        if self.paid_amount.is_none() {
            missing.push("paid_amount");
        }
        missing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyAggregate {
    #[schemars(description = "Either 'YYYY-MM' or a three-letter month abbreviation")]
    pub month_key: String,
    pub invoiced_total: f64,
    pub paid_total: f64,
    /// Always `invoiced_total - paid_total`; negative on overpayment.
    pub outstanding: f64,
    /// Percent change of `invoiced_total` against the previous month, one decimal.
    pub growth_rate: f64,
}

/// Which tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Provenance {
    #[schemars(description = "Precomputed per-entity summary record")]
    Summary,

    #[schemars(description = "Precomputed monthly table rows")]
    MonthlyTable,

    #[schemars(description = "Aggregated on the fly from raw transaction records")]
    RawRecords,

    #[schemars(description = "Static placeholder data; no tier produced anything usable")]
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum MetricsStatus {
    Idle,
    Loading,
    Ready,
    FallbackUsed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EntityMetrics {
    pub total_invoiced: f64,
    pub total_paid: f64,
    pub outstanding_amount: f64,
    pub average_days_to_pay: f64,
    pub late_count: u64,
    pub late_percentage: f64,
    pub total_invoices: u64,
    pub outstanding_invoices: u64,
    pub status_breakdown: StatusBreakdown,
    pub monthly: Vec<MonthlyAggregate>,
    pub provenance: Provenance,
    pub status: MetricsStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(
        description = "Fields the producing tier did not supply. They read as zero but must not be presented as real zeros."
    )]
    pub absent_fields: Vec<String>,
}

impl EntityMetrics {
    pub fn empty(provenance: Provenance) -> Self {
        Self {
            total_invoiced: 0.0,
            total_paid: 0.0,
            outstanding_amount: 0.0,
            average_days_to_pay: 0.0,
            late_count: 0,
            late_percentage: 0.0,
            total_invoices: 0,
            outstanding_invoices: 0,
            status_breakdown: StatusBreakdown::default(),
            monthly: Vec::new(),
            provenance,
            status: MetricsStatus::Ready,
            absent_fields: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_invoices == 0
            && self.monthly.is_empty()
            && self.status_breakdown.is_empty()
            && self.total_invoiced == 0.0
            && self.total_paid == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum MonthGranularity {
    #[schemars(description = "Group raw records by calendar month, keyed 'YYYY-MM'")]
    YearMonth,

    #[schemars(
        description = "Group raw records by month of year, keyed 'Jan'..'Dec'. Different years collapse into one bucket."
    )]
    ShortMonth,
}

impl Default for MonthGranularity {
    fn default() -> Self {
        Self::YearMonth
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MetricsConfig {
    #[schemars(description = "How raw transaction records are bucketed into months")]
    pub month_granularity: MonthGranularity,

    #[schemars(description = "Rows per page in the invoice explorer. Must be at least 1.")]
    pub page_size: usize,

    #[schemars(
        description = "When an invoice row carries no explicit late flag, it is late if it took more than this many days to pay"
    )]
    pub late_after_days: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            month_granularity: MonthGranularity::YearMonth,
            page_size: 10,
            late_after_days: 30.0,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(MetricsError::InvalidConfig(
                "page_size must be at least 1".to_string(),
            ));
        }
        if !self.late_after_days.is_finite() || self.late_after_days < 0.0 {
            return Err(MetricsError::InvalidConfig(format!(
                "late_after_days must be a non-negative number (got {})",
                self.late_after_days
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MetricsConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
