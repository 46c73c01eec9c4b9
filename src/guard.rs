//! Placement admission checks.
//!
//! [`CapacityGuard`] decides whether a production may take a timeslot. It
//! reads committed state only and never mutates; the reconciler consults it
//! before every placement mutation.
//!
//! # Check Order
//!
//! 1. **Stage**: the timeslot's stage equals the production's stage.
//! 2. **Exclusivity**: no other committed placement holds the timeslot.
//! 3. **Capacity**: fixed + scheduled placements of the production, minus
//!    the excluded one, stay below `max_shows`.

use crate::error::{LedgerError, LedgerResult, PlacementError};
use crate::models::{EntityRef, PlacementId, Production, Timeslot};
use crate::store::EntityStore;

/// Read-only admission view over a store.
#[derive(Debug, Clone, Copy)]
pub struct CapacityGuard<'a> {
    store: &'a EntityStore,
}

impl<'a> CapacityGuard<'a> {
    pub fn new(store: &'a EntityStore) -> Self {
        Self { store }
    }

    /// The placement holding `timeslot_id`, if any.
    pub fn occupant(&self, timeslot_id: &str) -> Option<PlacementId> {
        self.store.placement_at(timeslot_id)
    }

    /// Committed show count of a production, not counting `excluding`.
    pub fn show_count(&self, production_id: &str, excluding: Option<&PlacementId>) -> u32 {
        self.store
            .placements_of(production_id)
            .filter(|p| Some(p) != excluding)
            .count() as u32
    }

    /// Checks whether `production` may be placed at `timeslot`.
    ///
    /// `excluding` names a placement to ignore, typically the one being moved.
    pub fn can_place(
        &self,
        production: &Production,
        timeslot: &Timeslot,
        excluding: Option<&PlacementId>,
    ) -> Result<(), PlacementError> {
        if !production.plays_on(&timeslot.stage_id) {
            return Err(PlacementError::StageMismatch {
                production_id: production.id.clone(),
                production_stage: production.stage_id.clone(),
                timeslot_id: timeslot.id.clone(),
                timeslot_stage: timeslot.stage_id.clone(),
            });
        }

        if let Some(occupant) = self
            .occupant(&timeslot.id)
            .filter(|occupant| Some(occupant) != excluding)
        {
            return Err(PlacementError::SlotOccupied {
                timeslot_id: timeslot.id.clone(),
                occupied_by: occupant.production_id,
            });
        }

        let current = self.show_count(&production.id, excluding);
        if current >= production.max_shows {
            return Err(PlacementError::CapacityExceeded {
                production_id: production.id.clone(),
                current,
                limit: production.max_shows,
            });
        }
        Ok(())
    }

    /// [`Self::can_place`] by identity.
    pub fn check(
        &self,
        production_id: &str,
        timeslot_id: &str,
        excluding: Option<&PlacementId>,
    ) -> LedgerResult<()> {
        let production = self
            .store
            .production(production_id)
            .ok_or_else(|| LedgerError::UnknownEntity(EntityRef::production(production_id)))?;
        let timeslot = self
            .store
            .timeslot(timeslot_id)
            .ok_or_else(|| LedgerError::UnknownEntity(EntityRef::timeslot(timeslot_id)))?;
        self.can_place(production, timeslot, excluding)?;
        Ok(())
    }
}
