//! Adoption application lifecycle: entity storage, the pure transition engine,
//! role checks, and the coordinator that ties them into atomic actions.

pub mod coordinator;
pub mod domain;
pub mod engine;
pub mod gate;
pub mod memory;
pub mod router;
pub mod sqlite;
pub mod store;

#[cfg(test)]
mod tests;

pub use coordinator::{AdoptionError, OutcomeKind, TransitionCoordinator};
pub use domain::{
    Adoption, AdoptionId, AdoptionStatus, Animal, AnimalId, AnimalProfile, AnimalStatus,
    AnimalUpdate, AnimalView, Decision, DecisionReceipt, Gender, Identity, Role, UserId,
};
pub use engine::{SiblingSweep, Transition, TransitionError};
pub use gate::{Action, Forbidden};
pub use memory::InMemoryStore;
pub use router::adoption_router;
pub use sqlite::SqliteStore;
pub use store::{AdoptionFilter, EntityStore, StoreError, StoreTransaction};
