//! Error types for ledger operations.
//!
//! Every fallible operation returns [`LedgerResult`]. Operations validate
//! before they mutate, so an `Err` always means the store was left untouched.
//!
//! # Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Validation | `Validation`, `DuplicateId`, `InvalidScenario` |
//! | Referential | `DanglingReference`, `RemovalBlocked` |
//! | Placement | `Placement(PlacementError)` |
//! | Lookup | `UnknownEntity` |
//! | Configuration | `Config` |

use crate::models::EntityRef;
use crate::validation::ValidationIssue;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Error type for ledger operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    /// A required field is missing or a value is out of range.
    #[error("validation error: {0}")]
    Validation(String),

    /// An explicit identifier is already taken in its collection.
    #[error("duplicate id: {0} already exists")]
    DuplicateId(EntityRef),

    /// The addressed entity does not exist.
    #[error("{0} does not exist")]
    UnknownEntity(EntityRef),

    /// A foreign key points at an entity that does not exist.
    #[error("dangling reference: {field} -> {target}")]
    DanglingReference {
        /// Name of the referencing field.
        field: &'static str,
        /// The missing target.
        target: EntityRef,
    },

    /// A restricted delete found dependents.
    #[error("cannot remove {entity}: still referenced by {dependents} record(s)")]
    RemovalBlocked {
        /// Entity whose removal was requested.
        entity: EntityRef,
        /// Number of records referencing it.
        dependents: usize,
    },

    /// A placement mutation was refused.
    #[error(transparent)]
    Placement(#[from] PlacementError),

    /// Scenario-wide validation failed before a solve.
    #[error("invalid scenario: {} issue(s)", .0.len())]
    InvalidScenario(Vec<ValidationIssue>),

    /// Venue configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    /// Whether this is a referential-integrity failure.
    pub fn is_referential(&self) -> bool {
        matches!(
            self,
            LedgerError::DanglingReference { .. } | LedgerError::RemovalBlocked { .. }
        )
    }

    /// Whether this is an input-validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::Validation(_)
                | LedgerError::DuplicateId(_)
                | LedgerError::InvalidScenario(_)
        )
    }

    /// The placement failure, if this is one.
    pub fn as_placement(&self) -> Option<&PlacementError> {
        match self {
            LedgerError::Placement(err) => Some(err),
            _ => None,
        }
    }
}

/// Reasons a placement can be refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    /// The timeslot belongs to a different stage than the production.
    #[error(
        "production '{production_id}' plays on {}, timeslot '{timeslot_id}' is on stage '{timeslot_stage}'",
        .production_stage.as_deref().map_or_else(|| "no stage".to_string(), |s| format!("stage '{s}'"))
    )]
    StageMismatch {
        production_id: String,
        production_stage: Option<String>,
        timeslot_id: String,
        timeslot_stage: String,
    },

    /// Another placement already holds the timeslot.
    #[error("timeslot '{timeslot_id}' is already taken by production '{occupied_by}'")]
    SlotOccupied {
        timeslot_id: String,
        occupied_by: String,
    },

    /// The production has reached its show limit.
    #[error("production '{production_id}' already has {current} of {limit} show(s)")]
    CapacityExceeded {
        production_id: String,
        current: u32,
        limit: u32,
    },

    /// No placement of the production exists at the timeslot.
    #[error("production '{production_id}' is not placed at timeslot '{timeslot_id}'")]
    NotFound {
        production_id: String,
        timeslot_id: String,
    },
}
