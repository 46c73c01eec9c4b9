//! Repertoire ledger for a performing-arts venue.
//!
//! Keeps a venue's scheduling data (stages, productions, timeslots, people,
//! roles and placements) internally consistent while an editor makes
//! incremental changes and an external constraint solver periodically
//! replaces the computed schedule. The optimizer itself is not part of this
//! crate; [`solver`] defines the contract it is called through.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Stage`, `Production`, `Timeslot`, `Role`,
//!   `Person`, `PersonProductionRole`, placements and role assignments
//! - **`store`**: `EntityStore`, the single owner of every collection
//! - **`staging`**: `StagedEditResolver`, two-phase commit of references
//! - **`calendar`**: `VenueClock` and `CalendarSlotGenerator`
//! - **`guard`**: `CapacityGuard`, placement admission checks
//! - **`reconcile`**: `PlacementReconciler`, fixed vs. solver placements
//! - **`solver`**: Scheduler Service request/response types
//! - **`snapshot`**: read-only copies for views and solve requests
//! - **`validation`**: invariant and readiness checks
//! - **`roles`**: cast templates for productions
//! - **`config`**: TOML venue configuration
//!
//! # Example
//!
//! ```
//! use u_repertoire::{
//!     CalendarSlotGenerator, EntityStore, PlacementReconciler, ProductionDraft, StageDraft,
//!     VenueConfig,
//! };
//!
//! let config = VenueConfig::default();
//! let generator = CalendarSlotGenerator::new(&config).unwrap();
//! let mut store = EntityStore::new(&config).unwrap();
//!
//! store.create(StageDraft::new("Историческая сцена").with_id("s1")).unwrap();
//! store
//!     .create(ProductionDraft::new("Аида").with_id("aida").on_stage("s1").with_max_shows(2))
//!     .unwrap();
//! store.install_month(&generator, 2025, 11).unwrap();
//!
//! let reconciler = PlacementReconciler::new();
//! reconciler.fix(&mut store, "aida", "slot_2025-11-04_s1_1900").unwrap();
//! assert_eq!(store.show_count("aida"), 1);
//! ```

pub mod calendar;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod reconcile;
pub mod roles;
pub mod snapshot;
pub mod solver;
pub mod staging;
pub mod store;
pub mod validation;

pub use calendar::{CalendarSlotGenerator, VenueClock};
pub use config::{SolverSettings, VenueConfig};
pub use error::{LedgerError, LedgerResult, PlacementError};
pub use guard::CapacityGuard;
pub use models::{
    CapabilityDraft, Entity, EntityKind, EntityRef, PersonDraft, ProductionDraft, RemovePolicy,
    RoleDraft, StageDraft, TimeslotDraft,
};
pub use reconcile::{ApplyOutcome, ApplyReport, Confirmation, PlacementReconciler, ResetReport};
pub use snapshot::ScenarioSnapshot;
pub use solver::{ConstraintConfig, SolveRequest, SolveResponse, SolverStatus};
pub use staging::{StagedEditResolver, StagedField};
pub use store::{EntityStore, RemovalReport};
