//! Tracks which entity is selected and keeps late results for an earlier
//! selection from overwriting what is shown for the current one.
//!
//! Every call to [`SelectionContext::select`] bumps a generation counter and
//! hands back a [`SelectionTicket`]. A resolution started under a ticket may
//! only be displayed if, when it finishes, the ticket still names the active
//! selection. Outstanding resolutions are never interrupted; their results
//! are simply dropped.

use crate::resolver::{Resolution, TierResolver};
use crate::schema::{Entity, EntityMetrics, MetricsStatus, Provenance};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct ActiveSelection {
    entity: Option<Entity>,
    generation: u64,
}

impl ActiveSelection {
    fn matches(&self, ticket: &SelectionTicket) -> bool {
        self.generation == ticket.generation && self.entity.as_ref() == Some(&ticket.entity)
    }
}

#[derive(Debug, Clone)]
pub struct SelectionTicket {
    entity: Entity,
    generation: u64,
}

impl SelectionTicket {
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    active: Arc<Mutex<ActiveSelection>>,
}

impl SelectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ActiveSelection> {
        // The guarded data is two plain fields; a panic elsewhere cannot
        // leave it half-written.
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn advance(active: &mut ActiveSelection, entity: Entity) -> SelectionTicket {
        active.generation += 1;
        active.entity = Some(entity.clone());
        SelectionTicket {
            entity,
            generation: active.generation,
        }
    }

    pub fn select(&self, entity: Entity) -> SelectionTicket {
        Self::advance(&mut self.lock(), entity)
    }

    pub fn current(&self) -> Option<Entity> {
        self.lock().entity.clone()
    }

    pub fn is_current(&self, ticket: &SelectionTicket) -> bool {
        self.lock().matches(ticket)
    }
}

/// What the dashboard currently shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelState {
    pub entity: Option<Entity>,
    pub status: MetricsStatus,
    pub metrics: Option<EntityMetrics>,
    pub provenance: Option<Provenance>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            entity: None,
            status: MetricsStatus::Idle,
            metrics: None,
            provenance: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MetricsPanel {
    selection: SelectionContext,
    state: Mutex<PanelState>,
}

impl MetricsPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(selection: SelectionContext) -> Self {
        Self {
            selection,
            state: Mutex::new(PanelState::default()),
        }
    }

    pub fn selection(&self) -> &SelectionContext {
        &self.selection
    }

    fn lock_state(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes `entity` the active selection and shows it as loading.
    pub fn select(&self, entity: Entity) -> SelectionTicket {
        let mut active = self.selection.lock();
        let ticket = SelectionContext::advance(&mut active, entity.clone());
        *self.lock_state() = PanelState {
            entity: Some(entity),
            status: MetricsStatus::Loading,
            metrics: None,
            provenance: None,
        };
        ticket
    }

    /// Shows `resolution` if `ticket` is still the active selection.
    /// Returns whether it was applied.
    pub fn commit(&self, ticket: &SelectionTicket, resolution: Resolution<EntityMetrics>) -> bool {
        // Held across the write so a concurrent select cannot slip in between.
        let active = self.selection.lock();
        if !active.matches(ticket) {
            warn!(
                "Discarding stale metrics for {} (selection generation {} is no longer active)",
                ticket.entity.name, ticket.generation
            );
            return false;
        }

        info!(
            "Showing metrics for {} from {:?} ({:?})",
            ticket.entity.name, resolution.provenance, resolution.status
        );
        *self.lock_state() = PanelState {
            entity: Some(resolution.entity),
            status: resolution.status,
            metrics: Some(resolution.value),
            provenance: Some(resolution.provenance),
        };
        drop(active);
        true
    }

    /// Selects `entity`, resolves its metrics and shows them unless another
    /// selection happened in the meantime.
    pub async fn load(&self, resolver: &TierResolver, entity: Entity) -> bool {
        let ticket = self.select(entity);
        let resolution = resolver.resolve_metrics(ticket.entity()).await;
        self.commit(&ticket, resolution)
    }

    pub fn snapshot(&self) -> PanelState {
        self.lock_state().clone()
    }
}
