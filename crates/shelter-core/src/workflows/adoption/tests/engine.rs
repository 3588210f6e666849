use crate::workflows::adoption::domain::{AdoptionStatus, AnimalStatus, Decision};
use crate::workflows::adoption::engine::{
    accept, apply, decide, override_status, reject, SiblingSweep, TransitionError,
};

#[test]
fn first_application_moves_animal_into_adoption() {
    let transition = apply(AnimalStatus::Available, false).expect("apply allowed");
    assert_eq!(transition.animal_status, AnimalStatus::InAdoption);
    assert_eq!(transition.adoption_status, AdoptionStatus::Pending);
    assert!(transition.siblings.is_none());
}

#[test]
fn later_applications_leave_animal_in_adoption() {
    let transition = apply(AnimalStatus::InAdoption, false).expect("apply allowed");
    assert_eq!(transition.animal_status, AnimalStatus::InAdoption);
    assert!(!transition.changes_animal(AnimalStatus::InAdoption));
}

#[test]
fn applying_to_adopted_animal_is_already_placed() {
    assert_eq!(
        apply(AnimalStatus::Adopted, false),
        Err(TransitionError::AlreadyPlaced)
    );
    // Placement is reported before the duplicate check.
    assert_eq!(
        apply(AnimalStatus::Adopted, true),
        Err(TransitionError::AlreadyPlaced)
    );
}

#[test]
fn second_application_by_same_user_is_duplicate() {
    assert_eq!(
        apply(AnimalStatus::InAdoption, true),
        Err(TransitionError::DuplicateApplication)
    );
}

#[test]
fn accept_adopts_animal_and_sweeps_pending_siblings() {
    let transition = accept(AnimalStatus::InAdoption, AdoptionStatus::Pending).expect("accept");
    assert_eq!(transition.animal_status, AnimalStatus::Adopted);
    assert_eq!(transition.adoption_status, AdoptionStatus::Accepted);
    assert_eq!(
        transition.siblings,
        Some(SiblingSweep {
            from: AdoptionStatus::Pending,
            to: AdoptionStatus::RejectedAdopted,
        })
    );
}

#[test]
fn terminal_applications_cannot_be_decided() {
    for status in [
        AdoptionStatus::Accepted,
        AdoptionStatus::Rejected,
        AdoptionStatus::RejectedAdopted,
    ] {
        for decision in [Decision::Accept, Decision::Reject] {
            let result = decide(decision, AnimalStatus::InAdoption, status, 0);
            assert_eq!(
                result,
                Err(TransitionError::NotPending {
                    current: status,
                    attempted: decision,
                }),
                "{decision} on {status} must be refused"
            );
        }
    }
}

#[test]
fn accept_on_adopted_animal_is_refused() {
    assert_eq!(
        accept(AnimalStatus::Adopted, AdoptionStatus::Pending),
        Err(TransitionError::AnimalAdopted)
    );
}

#[test]
fn rejecting_last_pending_application_frees_animal() {
    let transition = reject(AnimalStatus::InAdoption, AdoptionStatus::Pending, 0).expect("reject");
    assert_eq!(transition.adoption_status, AdoptionStatus::Rejected);
    assert_eq!(transition.animal_status, AnimalStatus::Available);
}

#[test]
fn rejecting_with_other_pending_keeps_animal_in_adoption() {
    let transition = reject(AnimalStatus::InAdoption, AdoptionStatus::Pending, 2).expect("reject");
    assert_eq!(transition.animal_status, AnimalStatus::InAdoption);
    assert!(transition.siblings.is_none());
}

#[test]
fn rejecting_never_reverts_an_adopted_animal() {
    let transition = reject(AnimalStatus::Adopted, AdoptionStatus::Pending, 0).expect("reject");
    assert_eq!(transition.animal_status, AnimalStatus::Adopted);
}

#[test]
fn status_override_only_without_applications() {
    assert_eq!(
        override_status(AnimalStatus::Available, AnimalStatus::Adopted, 0),
        Ok(AnimalStatus::Adopted)
    );
    assert_eq!(
        override_status(AnimalStatus::InAdoption, AnimalStatus::Available, 1),
        Err(TransitionError::StatusLocked {
            requested: AnimalStatus::Available,
        })
    );
    assert_eq!(
        override_status(AnimalStatus::Available, AnimalStatus::InAdoption, 0),
        Err(TransitionError::StatusLocked {
            requested: AnimalStatus::InAdoption,
        })
    );
    assert_eq!(
        override_status(AnimalStatus::InAdoption, AnimalStatus::InAdoption, 3),
        Ok(AnimalStatus::InAdoption)
    );
}

#[test]
fn refusals_render_readable_messages() {
    let err = TransitionError::NotPending {
        current: AdoptionStatus::Accepted,
        attempted: Decision::Reject,
    };
    assert_eq!(
        err.to_string(),
        "application is already accepted; only pending applications can be rejected"
    );
}
