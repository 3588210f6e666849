use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    sort_by_application_date_desc, Adoption, AdoptionId, AdoptionStatus, Animal, AnimalId,
    AnimalProfile, AnimalStatus, AnimalUpdate, AnimalView, Decision, DecisionReceipt, Identity,
    NewAdoption, NewAnimal, Role,
};
use super::engine::{self, TransitionError};
use super::gate::{self, Action, Forbidden};
use super::store::{AdoptionFilter, EntityStore, StoreError};

/// Orchestrates one action end to end: gate, lock, decide, persist, report.
pub struct TransitionCoordinator<S> {
    store: Arc<S>,
}

impl<S> TransitionCoordinator<S>
where
    S: EntityStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// A user files an application for an animal.
    pub fn apply_for_adoption(
        &self,
        identity: &Identity,
        animal_id: AnimalId,
        contact_info: &str,
    ) -> Result<Adoption, AdoptionError> {
        gate::authorize(identity, Action::Apply)?;

        let contact_info = contact_info.trim();
        if contact_info.is_empty() {
            return Err(AdoptionError::InvalidInput(
                "contact information is required".to_string(),
            ));
        }
        if contact_info.chars().count() > MAX_CONTACT_INFO_CHARS {
            return Err(AdoptionError::InvalidInput(format!(
                "contact information must be at most {MAX_CONTACT_INFO_CHARS} characters"
            )));
        }

        let result: Result<Adoption, AdoptionError> = self.store.transaction(|tx| {
            let mut animal = tx
                .load_animal_for_update(animal_id)?
                .ok_or(AdoptionError::AnimalNotFound(animal_id))?;
            let existing = tx.find_adoption(animal_id, identity.user_id)?;
            let transition = engine::apply(animal.status, existing.is_some())?;

            let adoption = tx
                .insert_adoption(NewAdoption {
                    animal_id,
                    user_id: identity.user_id,
                    contact_info: contact_info.to_string(),
                    application_date: Utc::now(),
                })
                .map_err(|err| match err {
                    StoreError::Conflict(_) => {
                        AdoptionError::Rejected(TransitionError::DuplicateApplication)
                    }
                    other => AdoptionError::Store(other),
                })?;

            if transition.changes_animal(animal.status) {
                animal.status = transition.animal_status;
                tx.save_animal(&animal)?;
            }

            Ok(adoption)
        });

        match &result {
            Ok(adoption) => info!(
                adoption_id = %adoption.id,
                animal_id = %animal_id,
                user_id = %identity.user_id,
                "adoption application filed"
            ),
            Err(err) => report_failure("apply", err),
        }
        result
    }

    /// Staff accept or reject a pending application.
    pub fn decide_adoption(
        &self,
        identity: &Identity,
        adoption_id: AdoptionId,
        decision: Decision,
    ) -> Result<DecisionReceipt, AdoptionError> {
        gate::authorize(identity, Action::from(decision))?;

        let result: Result<DecisionReceipt, AdoptionError> = self.store.transaction(|tx| {
            let located = tx
                .load_adoption(adoption_id)?
                .ok_or(AdoptionError::AdoptionNotFound(adoption_id))?;
            let mut animal = tx
                .load_animal_for_update(located.animal_id)?
                .ok_or(AdoptionError::AnimalNotFound(located.animal_id))?;
            // Re-read under the animal lock so the decision sees committed state.
            let mut adoption = tx
                .load_adoption(adoption_id)?
                .ok_or(AdoptionError::AdoptionNotFound(adoption_id))?;

            let remaining_pending = match decision {
                Decision::Accept => 0,
                Decision::Reject => tx.count_adoptions(
                    &AdoptionFilter::for_animal(animal.id)
                        .with_status(AdoptionStatus::Pending)
                        .excluding(adoption.id),
                )?,
            };
            let transition =
                engine::decide(decision, animal.status, adoption.status, remaining_pending)?;

            adoption.status = transition.adoption_status;
            tx.save_adoption(&adoption)?;

            let siblings_closed = match transition.siblings {
                Some(sweep) => tx.bulk_update_status(
                    &AdoptionFilter::for_animal(animal.id)
                        .with_status(sweep.from)
                        .excluding(adoption.id),
                    sweep.to,
                )?,
                None => 0,
            };

            if transition.changes_animal(animal.status) {
                animal.status = transition.animal_status;
                tx.save_animal(&animal)?;
            }

            Ok(DecisionReceipt {
                adoption,
                animal,
                siblings_closed,
            })
        });

        match &result {
            Ok(receipt) => info!(
                adoption_id = %adoption_id,
                animal_id = %receipt.animal.id,
                decision = decision.label(),
                animal_status = receipt.animal.status.label(),
                siblings_closed = receipt.siblings_closed,
                "adoption decision recorded"
            ),
            Err(err) => report_failure(decision.label(), err),
        }
        result
    }

    /// Read-only projection of an animal. Staff see every application, a user
    /// sees only their own, anonymous callers see none.
    pub fn animal_view(
        &self,
        viewer: Option<&Identity>,
        animal_id: AnimalId,
    ) -> Result<AnimalView, AdoptionError> {
        self.store.read(|tx| {
            let animal = tx
                .load_animal(animal_id)?
                .ok_or(AdoptionError::AnimalNotFound(animal_id))?;

            let mut adoptions = match viewer {
                Some(identity) if gate::permit(identity.role, Action::ViewApplications) => {
                    tx.adoptions(&AdoptionFilter::for_animal(animal_id))?
                }
                Some(identity) if identity.role == Role::User => tx
                    .find_adoption(animal_id, identity.user_id)?
                    .into_iter()
                    .collect(),
                _ => Vec::new(),
            };
            sort_by_application_date_desc(&mut adoptions);

            Ok(AnimalView { animal, adoptions })
        })
    }

    /// Catalog listing: available first, then in adoption, then adopted;
    /// newest animals first within each group.
    pub fn list_animals(&self) -> Result<Vec<Animal>, AdoptionError> {
        let mut animals = self
            .store
            .read(|tx| tx.list_animals().map_err(AdoptionError::from))?;
        animals.sort_by(|left, right| {
            left.status
                .catalog_rank()
                .cmp(&right.status.catalog_rank())
                .then_with(|| right.created_at.cmp(&left.created_at))
                .then_with(|| right.id.cmp(&left.id))
        });
        Ok(animals)
    }

    pub fn create_animal(
        &self,
        identity: &Identity,
        profile: AnimalProfile,
    ) -> Result<Animal, AdoptionError> {
        gate::authorize(identity, Action::CreateAnimal)?;
        validate_profile(&profile)?;

        let animal = self.store.transaction(|tx| {
            tx.insert_animal(NewAnimal {
                profile,
                status: AnimalStatus::Available,
                created_at: Utc::now(),
            })
            .map_err(AdoptionError::from)
        })?;

        info!(animal_id = %animal.id, name = %animal.profile.name, "animal registered");
        Ok(animal)
    }

    /// Update an animal's profile. A status override is honored only while the
    /// animal has no applications.
    pub fn edit_animal(
        &self,
        identity: &Identity,
        animal_id: AnimalId,
        update: AnimalUpdate,
    ) -> Result<Animal, AdoptionError> {
        gate::authorize(identity, Action::EditAnimal)?;
        validate_profile(&update.profile)?;

        let result: Result<Animal, AdoptionError> = self.store.transaction(|tx| {
            let mut animal = tx
                .load_animal_for_update(animal_id)?
                .ok_or(AdoptionError::AnimalNotFound(animal_id))?;

            if let Some(requested) = update.status {
                let applications = tx.count_adoptions(&AdoptionFilter::for_animal(animal_id))?;
                animal.status = engine::override_status(animal.status, requested, applications)?;
            }
            animal.profile = update.profile;
            tx.save_animal(&animal)?;
            Ok(animal)
        });

        match &result {
            Ok(animal) => info!(animal_id = %animal.id, status = animal.status.label(), "animal updated"),
            Err(err) => report_failure("edit_animal", err),
        }
        result
    }

    /// Remove an animal and, by cascade, every application filed for it.
    pub fn delete_animal(
        &self,
        identity: &Identity,
        animal_id: AnimalId,
    ) -> Result<Animal, AdoptionError> {
        gate::authorize(identity, Action::DeleteAnimal)?;

        let result: Result<Animal, AdoptionError> = self.store.transaction(|tx| {
            let animal = tx
                .load_animal_for_update(animal_id)?
                .ok_or(AdoptionError::AnimalNotFound(animal_id))?;
            tx.delete_animal(animal_id)?;
            Ok(animal)
        });

        match &result {
            Ok(animal) => info!(animal_id = %animal.id, name = %animal.profile.name, "animal deleted"),
            Err(err) => report_failure("delete_animal", err),
        }
        result
    }
}

// Column widths of the persisted records.
const MAX_CONTACT_INFO_CHARS: usize = 255;
const MAX_NAME_CHARS: usize = 100;
const MAX_BREED_CHARS: usize = 100;

fn validate_profile(profile: &AnimalProfile) -> Result<(), AdoptionError> {
    let name = profile.name.trim();
    if name.is_empty() {
        return Err(AdoptionError::InvalidInput("animal name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(AdoptionError::InvalidInput(format!(
            "animal name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    if profile.breed.trim().chars().count() > MAX_BREED_CHARS {
        return Err(AdoptionError::InvalidInput(format!(
            "breed must be at most {MAX_BREED_CHARS} characters"
        )));
    }
    if profile.age_in_months == 0 {
        return Err(AdoptionError::InvalidInput(
            "age must be at least one month".to_string(),
        ));
    }
    Ok(())
}

fn report_failure(action: &str, err: &AdoptionError) {
    match err.kind() {
        OutcomeKind::StoreError => warn!(action, error = %err, "transaction rolled back"),
        kind => debug!(action, outcome = kind.label(), error = %err, "action refused"),
    }
}

/// Error returned by coordinator operations. Every variant is recoverable by
/// the caller; [`AdoptionError::kind`] gives the discriminated outcome.
#[derive(Debug, thiserror::Error)]
pub enum AdoptionError {
    #[error(transparent)]
    Forbidden(#[from] Forbidden),
    #[error("animal {0} not found")]
    AnimalNotFound(AnimalId),
    #[error("adoption application {0} not found")]
    AdoptionNotFound(AdoptionId),
    #[error(transparent)]
    Rejected(#[from] TransitionError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdoptionError {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            AdoptionError::Forbidden(_) => OutcomeKind::Forbidden,
            AdoptionError::AnimalNotFound(_) | AdoptionError::AdoptionNotFound(_) => {
                OutcomeKind::NotFound
            }
            AdoptionError::Rejected(TransitionError::AlreadyPlaced) => OutcomeKind::AlreadyPlaced,
            AdoptionError::Rejected(TransitionError::DuplicateApplication) => {
                OutcomeKind::DuplicateApplication
            }
            AdoptionError::Rejected(_) => OutcomeKind::InvalidTransition,
            AdoptionError::InvalidInput(_) => OutcomeKind::InvalidInput,
            AdoptionError::Store(StoreError::NotFound) => OutcomeKind::NotFound,
            AdoptionError::Store(_) => OutcomeKind::StoreError,
        }
    }
}

/// Discriminated result code for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    Forbidden,
    NotFound,
    InvalidTransition,
    AlreadyPlaced,
    DuplicateApplication,
    InvalidInput,
    StoreError,
}

impl OutcomeKind {
    pub const fn label(self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Forbidden => "forbidden",
            OutcomeKind::NotFound => "not_found",
            OutcomeKind::InvalidTransition => "invalid_transition",
            OutcomeKind::AlreadyPlaced => "already_placed",
            OutcomeKind::DuplicateApplication => "duplicate_application",
            OutcomeKind::InvalidInput => "invalid_input",
            OutcomeKind::StoreError => "store_error",
        }
    }

    pub fn of<T>(result: &Result<T, AdoptionError>) -> Self {
        match result {
            Ok(_) => OutcomeKind::Success,
            Err(err) => err.kind(),
        }
    }
}
