//! Pure adoption lifecycle state machine.
//!
//! Every function here maps the current animal and application statuses to the
//! statuses that must be written together. Nothing in this module touches the
//! store; the coordinator supplies the counts it needs and persists the result.

use serde::Serialize;

use super::domain::{AdoptionStatus, AnimalStatus, Decision};

/// Status changes computed for a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub animal_status: AnimalStatus,
    pub adoption_status: AdoptionStatus,
    pub siblings: Option<SiblingSweep>,
}

impl Transition {
    pub fn changes_animal(&self, current: AnimalStatus) -> bool {
        self.animal_status != current
    }
}

/// Bulk update applied to every other application of the same animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SiblingSweep {
    pub from: AdoptionStatus,
    pub to: AdoptionStatus,
}

/// Business-rule refusal raised by the lifecycle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("application is already {current}; only pending applications can be {attempted}ed")]
    NotPending {
        current: AdoptionStatus,
        attempted: Decision,
    },
    #[error("animal has already been adopted through another application")]
    AnimalAdopted,
    #[error("animal has already found a home")]
    AlreadyPlaced,
    #[error("an application for this animal already exists for this user")]
    DuplicateApplication,
    #[error("animal status is derived from its applications and cannot be set to {requested}")]
    StatusLocked { requested: AnimalStatus },
}

/// A user files a new application.
///
/// `has_existing` reports whether the same user already holds an application
/// for the animal in any status.
pub fn apply(animal: AnimalStatus, has_existing: bool) -> Result<Transition, TransitionError> {
    if animal == AnimalStatus::Adopted {
        return Err(TransitionError::AlreadyPlaced);
    }
    if has_existing {
        return Err(TransitionError::DuplicateApplication);
    }

    let animal_status = match animal {
        AnimalStatus::Available => AnimalStatus::InAdoption,
        other => other,
    };

    Ok(Transition {
        animal_status,
        adoption_status: AdoptionStatus::Pending,
        siblings: None,
    })
}

/// Staff accept a pending application. First accept wins: every other pending
/// sibling is closed as `rejected_adopted` in the same write.
pub fn accept(animal: AnimalStatus, adoption: AdoptionStatus) -> Result<Transition, TransitionError> {
    require_pending(adoption, Decision::Accept)?;
    if animal == AnimalStatus::Adopted {
        return Err(TransitionError::AnimalAdopted);
    }

    Ok(Transition {
        animal_status: AnimalStatus::Adopted,
        adoption_status: AdoptionStatus::Accepted,
        siblings: Some(SiblingSweep {
            from: AdoptionStatus::Pending,
            to: AdoptionStatus::RejectedAdopted,
        }),
    })
}

/// Staff reject a pending application.
///
/// `remaining_pending` counts the animal's other pending applications, not
/// including the one being rejected.
pub fn reject(
    animal: AnimalStatus,
    adoption: AdoptionStatus,
    remaining_pending: usize,
) -> Result<Transition, TransitionError> {
    require_pending(adoption, Decision::Reject)?;

    let animal_status = if remaining_pending == 0 && animal != AnimalStatus::Adopted {
        AnimalStatus::Available
    } else {
        animal
    };

    Ok(Transition {
        animal_status,
        adoption_status: AdoptionStatus::Rejected,
        siblings: None,
    })
}

/// Dispatch a staff decision to the matching transition.
pub fn decide(
    decision: Decision,
    animal: AnimalStatus,
    adoption: AdoptionStatus,
    remaining_pending: usize,
) -> Result<Transition, TransitionError> {
    match decision {
        Decision::Accept => accept(animal, adoption),
        Decision::Reject => reject(animal, adoption, remaining_pending),
    }
}

/// Staff edits may set the status directly only while the animal has no
/// applications, and never to `in_adoption`, which only an application implies.
pub fn override_status(
    current: AnimalStatus,
    requested: AnimalStatus,
    application_count: usize,
) -> Result<AnimalStatus, TransitionError> {
    if requested == current {
        return Ok(current);
    }
    if application_count > 0 || requested == AnimalStatus::InAdoption {
        return Err(TransitionError::StatusLocked { requested });
    }
    Ok(requested)
}

fn require_pending(adoption: AdoptionStatus, attempted: Decision) -> Result<(), TransitionError> {
    if adoption.is_terminal() {
        return Err(TransitionError::NotPending {
            current: adoption,
            attempted,
        });
    }
    Ok(())
}
