use crate::aggregator::{MonthlyPaymentTrend, RawRecordAggregator};
use crate::error::{MetricsError, Result};
use crate::fallback::{
    fallback_metrics, fallback_monthly, fallback_payment_trends, fallback_status_breakdown,
};
use crate::ingestion::{metrics_from_monthly_rows, monthly_series_from_rows, MonthlyRow, SummaryRecord};
use crate::schema::{
    Entity, EntityMetrics, MetricsConfig, MetricsStatus, MonthlyAggregate, Provenance,
    TransactionRecord,
};
use crate::status::StatusBreakdown;
use crate::store::{MonthlyStore, SummaryStore, TransactionStore};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of asking one tier for data.
#[derive(Debug)]
pub enum TierOutcome<T> {
    Found(T),
    Empty,
    Failed(MetricsError),
}

impl<T> TierOutcome<T> {
    fn from_fetch(result: Result<T>, has_data: impl FnOnce(&T) -> bool) -> Self {
        match result {
            Ok(value) if has_data(&value) => TierOutcome::Found(value),
            Ok(_) => TierOutcome::Empty,
            Err(e) => TierOutcome::Failed(e),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Option<U>) -> TierOutcome<U> {
        match self {
            TierOutcome::Found(value) => match f(value) {
                Some(mapped) => TierOutcome::Found(mapped),
                None => TierOutcome::Empty,
            },
            TierOutcome::Empty => TierOutcome::Empty,
            TierOutcome::Failed(e) => TierOutcome::Failed(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Accepted,
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAttempt {
    pub tier: Provenance,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution<T> {
    pub entity: Entity,
    pub value: T,
    pub provenance: Provenance,
    pub status: MetricsStatus,
    /// Every tier tried, in order, including the accepting one.
    pub attempts: Vec<TierAttempt>,
}

impl<T> Resolution<T> {
    pub fn used_fallback(&self) -> bool {
        self.status == MetricsStatus::FallbackUsed
    }

    /// Whether any tier failed rather than simply having nothing.
    pub fn had_access_failure(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a.outcome, AttemptOutcome::Failed(_)))
    }

    pub fn tiers_attempted(&self) -> Vec<Provenance> {
        self.attempts.iter().map(|a| a.tier).collect()
    }
}

/// Bookkeeping for one pass down the tiers.
struct Cascade<'a> {
    entity: &'a Entity,
    what: &'static str,
    attempts: Vec<TierAttempt>,
}

impl<'a> Cascade<'a> {
    fn new(entity: &'a Entity, what: &'static str) -> Self {
        info!("Resolving {} for entity: {}", what, entity.name);
        Self {
            entity,
            what,
            attempts: Vec::new(),
        }
    }

    fn attempt<T>(&mut self, tier: Provenance, outcome: TierOutcome<T>) -> Option<T> {
        let (recorded, value) = match outcome {
            TierOutcome::Found(value) => (AttemptOutcome::Accepted, Some(value)),
            TierOutcome::Empty => {
                debug!(
                    "{:?} tier has no {} for {}",
                    tier, self.what, self.entity.name
                );
                (AttemptOutcome::Empty, None)
            }
            TierOutcome::Failed(e) => {
                warn!(
                    "{:?} tier failed for {}: {}; trying next tier",
                    tier, self.entity.name, e
                );
                (AttemptOutcome::Failed(e.to_string()), None)
            }
        };
        self.attempts.push(TierAttempt {
            tier,
            outcome: recorded,
        });
        value
    }

    fn accept<T>(self, tier: Provenance, value: T) -> Resolution<T> {
        info!(
            "Resolved {} for {} from {:?} tier",
            self.what, self.entity.name, tier
        );
        Resolution {
            entity: self.entity.clone(),
            value,
            provenance: tier,
            status: MetricsStatus::Ready,
            attempts: self.attempts,
        }
    }

    fn fall_back<T>(mut self, value: T) -> Resolution<T> {
        warn!(
            "No tier produced {} for {}; using fallback data",
            self.what, self.entity.name
        );
        self.attempts.push(TierAttempt {
            tier: Provenance::Fallback,
            outcome: AttemptOutcome::Accepted,
        });
        Resolution {
            entity: self.entity.clone(),
            value,
            provenance: Provenance::Fallback,
            status: MetricsStatus::FallbackUsed,
            attempts: self.attempts,
        }
    }
}

/// Walks summary, monthly table and raw records in that order, one at a
/// time, and stops at the first tier with usable data.
#[derive(Clone)]
pub struct TierResolver {
    summary: Arc<dyn SummaryStore>,
    monthly: Arc<dyn MonthlyStore>,
    raw: Arc<dyn TransactionStore>,
    config: MetricsConfig,
}

impl TierResolver {
    pub fn new(
        summary: Arc<dyn SummaryStore>,
        monthly: Arc<dyn MonthlyStore>,
        raw: Arc<dyn TransactionStore>,
        config: MetricsConfig,
    ) -> Self {
        Self {
            summary,
            monthly,
            raw,
            config,
        }
    }

    /// One backend serving all three tiers.
    pub fn from_store<S>(store: Arc<S>, config: MetricsConfig) -> Self
    where
        S: SummaryStore + MonthlyStore + TransactionStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, config)
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    fn aggregator(&self) -> RawRecordAggregator {
        RawRecordAggregator::from_config(&self.config)
    }

    async fn summary_tier(&self, entity: &Entity) -> TierOutcome<SummaryRecord> {
        let fetched = self.summary.fetch_summary(&entity.name).await;
        TierOutcome::from_fetch(fetched, |summary| {
            summary.as_ref().is_some_and(SummaryRecord::has_any_field)
        })
        .and_then(|summary| summary)
    }

    async fn monthly_tier(&self, entity: &Entity) -> TierOutcome<Vec<MonthlyRow>> {
        let fetched = self.monthly.fetch_monthly_rows(&entity.name).await;
        TierOutcome::from_fetch(fetched, |rows| !rows.is_empty())
    }

    async fn raw_tier(&self, entity: &Entity) -> TierOutcome<Vec<TransactionRecord>> {
        let fetched = self.raw.fetch_transactions(&entity.name).await;
        TierOutcome::from_fetch(fetched, |records| !records.is_empty())
    }

    pub async fn resolve_metrics(&self, entity: &Entity) -> Resolution<EntityMetrics> {
        let mut cascade = Cascade::new(entity, "metrics");

        let outcome = self.summary_tier(entity).await;
        if let Some(summary) = cascade.attempt(Provenance::Summary, outcome) {
            return cascade.accept(Provenance::Summary, summary.to_metrics());
        }

        let outcome = self.monthly_tier(entity).await;
        if let Some(rows) = cascade.attempt(Provenance::MonthlyTable, outcome) {
            return cascade.accept(Provenance::MonthlyTable, metrics_from_monthly_rows(&rows));
        }

        let aggregator = self.aggregator();
        let outcome = self.raw_tier(entity).await.and_then(|records| {
            let aggregation = aggregator.aggregate(&records);
            (!aggregation.is_empty()).then_some(aggregation.metrics)
        });
        if let Some(metrics) = cascade.attempt(Provenance::RawRecords, outcome) {
            return cascade.accept(Provenance::RawRecords, metrics);
        }

        cascade.fall_back(fallback_metrics())
    }

    /// Revenue-over-time series. A tier counts only if it yields at least one month.
    pub async fn resolve_monthly(&self, entity: &Entity) -> Resolution<Vec<MonthlyAggregate>> {
        let mut cascade = Cascade::new(entity, "monthly series");
        let non_empty = |series: Vec<MonthlyAggregate>| (!series.is_empty()).then_some(series);

        let outcome = self
            .summary_tier(entity)
            .await
            .and_then(|summary| non_empty(summary.monthly_series()));
        if let Some(series) = cascade.attempt(Provenance::Summary, outcome) {
            return cascade.accept(Provenance::Summary, series);
        }

        let outcome = self
            .monthly_tier(entity)
            .await
            .and_then(|rows| non_empty(monthly_series_from_rows(&rows)));
        if let Some(series) = cascade.attempt(Provenance::MonthlyTable, outcome) {
            return cascade.accept(Provenance::MonthlyTable, series);
        }

        let aggregator = self.aggregator();
        let outcome = self
            .raw_tier(entity)
            .await
            .and_then(|records| non_empty(aggregator.monthly(&records)));
        if let Some(series) = cascade.attempt(Provenance::RawRecords, outcome) {
            return cascade.accept(Provenance::RawRecords, series);
        }

        cascade.fall_back(fallback_monthly())
    }

    /// The monthly table carries no status data, so it is not consulted.
    pub async fn resolve_status_breakdown(&self, entity: &Entity) -> Resolution<StatusBreakdown> {
        let mut cascade = Cascade::new(entity, "status breakdown");
        let non_empty =
            |breakdown: StatusBreakdown| (!breakdown.is_empty()).then_some(breakdown);

        let outcome = self
            .summary_tier(entity)
            .await
            .and_then(|summary| non_empty(summary.status_breakdown()));
        if let Some(breakdown) = cascade.attempt(Provenance::Summary, outcome) {
            return cascade.accept(Provenance::Summary, breakdown);
        }

        let outcome = self.raw_tier(entity).await.and_then(|records| {
            non_empty(StatusBreakdown::from_labels(
                records.iter().map(|r| r.payment_status.as_deref()),
            ))
        });
        if let Some(breakdown) = cascade.attempt(Provenance::RawRecords, outcome) {
            return cascade.accept(Provenance::RawRecords, breakdown);
        }

        cascade.fall_back(fallback_status_breakdown())
    }

    /// Per-month late share and days to pay. Only raw records carry this.
    pub async fn resolve_payment_trends(
        &self,
        entity: &Entity,
    ) -> Resolution<Vec<MonthlyPaymentTrend>> {
        let mut cascade = Cascade::new(entity, "payment trends");
        let aggregator = self.aggregator();

        let outcome = self.raw_tier(entity).await.and_then(|records| {
            let trends = aggregator.payment_trends(&records);
            (!trends.is_empty()).then_some(trends)
        });
        if let Some(trends) = cascade.attempt(Provenance::RawRecords, outcome) {
            return cascade.accept(Provenance::RawRecords, trends);
        }

        cascade.fall_back(fallback_payment_trends())
    }
}
