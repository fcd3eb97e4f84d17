//! # Receivables Metrics
//!
//! A library for resolving accounts-receivable KPIs for a selected business
//! entity from data sources of varying completeness.
//!
//! ## Core Concepts
//!
//! - **Tiers**: A precomputed summary, a precomputed monthly table and raw transaction
//!   records, consulted in that order; the first with usable data wins
//! - **Raw Aggregation**: Totals, averages, late shares and monthly series recomputed from
//!   individual invoices when nothing precomputed exists
//! - **Status Normalization**: Free-text payment labels mapped onto a fixed set of categories
//! - **Fallback**: Fixed demo figures, always flagged, when every tier comes back empty
//! - **Selection Guard**: A result for an entity that is no longer selected is never shown
//!
//! ## Example
//!
//! ```rust,ignore
//! use receivables_metrics::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::new().with_transactions("Acme Corp", records));
//! let resolver = TierResolver::from_store(store, MetricsConfig::default());
//!
//! let panel = MetricsPanel::new();
//! panel.load(&resolver, Entity::new("acme", "Acme Corp")).await;
//!
//! let shown = panel.snapshot();
//! println!("{:?} from {:?}", shown.status, shown.provenance);
//! ```

pub mod aggregator;
pub mod error;
pub mod fallback;
pub mod filters;
pub mod ingestion;
pub mod resolver;
pub mod schema;
pub mod selection;
pub mod status;
pub mod store;
pub mod timeseries;
pub mod utils;

pub use aggregator::{MonthlyPaymentTrend, RawAggregation, RawRecordAggregator};
pub use error::{MetricsError, Result};
pub use fallback::*;
pub use filters::{
    explore_invoices, late_records, page_count, paginate, InvoiceFilter, InvoiceSort, Page,
    SortDirection, SortField,
};
pub use ingestion::*;
pub use resolver::{AttemptOutcome, Resolution, TierAttempt, TierOutcome, TierResolver};
pub use schema::*;
pub use selection::{MetricsPanel, PanelState, SelectionContext, SelectionTicket};
pub use status::*;
pub use store::{InMemoryStore, MonthlyStore, SummaryStore, TransactionStore};
pub use timeseries::*;
pub use utils::*;

use log::info;
use serde::{Deserialize, Serialize};

/// Everything the dashboard needs for one entity, each part resolved on its
/// own so a sparse summary does not hide a richer series further down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub metrics: Resolution<EntityMetrics>,
    pub monthly: Resolution<Vec<MonthlyAggregate>>,
    pub status_breakdown: Resolution<StatusBreakdown>,
    pub payment_trends: Resolution<Vec<MonthlyPaymentTrend>>,
}

impl DashboardSnapshot {
    /// Whether any part had to use placeholder data.
    pub fn uses_fallback(&self) -> bool {
        self.metrics.used_fallback()
            || self.monthly.used_fallback()
            || self.status_breakdown.used_fallback()
            || self.payment_trends.used_fallback()
    }
}

pub async fn load_dashboard(resolver: &TierResolver, entity: &Entity) -> DashboardSnapshot {
    info!("Loading dashboard for entity: {}", entity.name);

    let metrics = resolver.resolve_metrics(entity).await;
    let monthly = resolver.resolve_monthly(entity).await;
    let status_breakdown = resolver.resolve_status_breakdown(entity).await;
    let payment_trends = resolver.resolve_payment_trends(entity).await;

    DashboardSnapshot {
        metrics,
        monthly,
        status_breakdown,
        payment_trends,
    }
}
