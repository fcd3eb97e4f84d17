//! Read-only data sources the resolver pulls from, keyed by entity name.

use crate::error::{MetricsError, Result};
use crate::ingestion::{convert_invoice_rows, InvoiceRow, MonthlyRow, SummaryRecord};
use crate::schema::{MetricsConfig, Provenance, TransactionRecord};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

#[async_trait]
pub trait SummaryStore: Send + Sync {
    async fn fetch_summary(&self, entity_name: &str) -> Result<Option<SummaryRecord>>;
}

/// Rows come back in no particular order.
#[async_trait]
pub trait MonthlyStore: Send + Sync {
    async fn fetch_monthly_rows(&self, entity_name: &str) -> Result<Vec<MonthlyRow>>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn fetch_transactions(&self, entity_name: &str) -> Result<Vec<TransactionRecord>>;
}

#[derive(Debug, Default)]
struct CallCounts {
    summary: AtomicUsize,
    monthly: AtomicUsize,
    raw: AtomicUsize,
}

/// All three tiers held in memory. Tiers can be marked unavailable to
/// simulate an unreachable backend, and every fetch is counted.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    summaries: HashMap<String, SummaryRecord>,
    monthly: HashMap<String, Vec<MonthlyRow>>,
    transactions: HashMap<String, Vec<TransactionRecord>>,
    unavailable: HashSet<Provenance>,
    calls: CallCounts,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summary(mut self, entity_name: impl Into<String>, summary: SummaryRecord) -> Self {
        self.summaries.insert(entity_name.into(), summary);
        self
    }

    pub fn with_monthly_rows(
        mut self,
        entity_name: impl Into<String>,
        rows: Vec<MonthlyRow>,
    ) -> Self {
        self.monthly.entry(entity_name.into()).or_default().extend(rows);
        self
    }

    pub fn with_transactions(
        mut self,
        entity_name: impl Into<String>,
        records: Vec<TransactionRecord>,
    ) -> Self {
        self.transactions
            .entry(entity_name.into())
            .or_default()
            .extend(records);
        self
    }

    /// Files invoice table rows under their client name.
    pub fn with_invoice_rows(mut self, rows: Vec<InvoiceRow>, config: &MetricsConfig) -> Self {
        for record in convert_invoice_rows(rows, config) {
            self.transactions
                .entry(record.entity_name.clone())
                .or_default()
                .push(record);
        }
        self
    }

    pub fn unavailable(mut self, tier: Provenance) -> Self {
        self.unavailable.insert(tier);
        self
    }

    pub fn call_count(&self, tier: Provenance) -> usize {
        match tier {
            Provenance::Summary => self.calls.summary.load(Ordering::SeqCst),
            Provenance::MonthlyTable => self.calls.monthly.load(Ordering::SeqCst),
            Provenance::RawRecords => self.calls.raw.load(Ordering::SeqCst),
            Provenance::Fallback => 0,
        }
    }

    fn check_available(&self, tier: Provenance) -> Result<()> {
        if self.unavailable.contains(&tier) {
            return Err(MetricsError::tier_access(tier, "backend unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SummaryStore for InMemoryStore {
    async fn fetch_summary(&self, entity_name: &str) -> Result<Option<SummaryRecord>> {
        self.calls.summary.fetch_add(1, Ordering::SeqCst);
        self.check_available(Provenance::Summary)?;
        Ok(self.summaries.get(entity_name).cloned())
    }
}

#[async_trait]
impl MonthlyStore for InMemoryStore {
    async fn fetch_monthly_rows(&self, entity_name: &str) -> Result<Vec<MonthlyRow>> {
        self.calls.monthly.fetch_add(1, Ordering::SeqCst);
        self.check_available(Provenance::MonthlyTable)?;
        Ok(self.monthly.get(entity_name).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn fetch_transactions(&self, entity_name: &str) -> Result<Vec<TransactionRecord>> {
        self.calls.raw.fetch_add(1, Ordering::SeqCst);
        self.check_available(Provenance::RawRecords)?;
        Ok(self
            .transactions
            .get(entity_name)
            .cloned()
            .unwrap_or_default())
    }
}
