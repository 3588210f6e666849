use std::sync::Arc;

use shelter_core::workflows::adoption::{
    AdoptionStatus, AnimalProfile, AnimalStatus, Decision, Gender, Identity, InMemoryStore,
    OutcomeKind, Role, TransitionCoordinator, UserId,
};

fn staff() -> Identity {
    Identity::new(UserId(1), Role::Admin)
}

fn applicant(id: i64) -> Identity {
    Identity::new(UserId(id), Role::User)
}

fn kitten(name: &str) -> AnimalProfile {
    AnimalProfile {
        name: name.to_string(),
        description: "Shy at first, very affectionate".to_string(),
        age_in_months: 4,
        breed: "Domestic shorthair".to_string(),
        gender: Gender::Female,
    }
}

#[test]
fn placement_closes_every_competing_application() {
    let coordinator = TransitionCoordinator::new(Arc::new(InMemoryStore::default()));
    let animal = coordinator
        .create_animal(&staff(), kitten("Mochi"))
        .expect("animal registered");

    let applications: Vec<_> = (10..15)
        .map(|id| {
            coordinator
                .apply_for_adoption(&applicant(id), animal.id, "call after 6pm")
                .expect("application filed")
        })
        .collect();

    let winner = &applications[2];
    coordinator
        .decide_adoption(&staff(), winner.id, Decision::Accept)
        .expect("accept");

    let view = coordinator
        .animal_view(Some(&staff()), animal.id)
        .expect("staff view");
    assert_eq!(view.animal.status, AnimalStatus::Adopted);
    for adoption in &view.adoptions {
        let expected = if adoption.id == winner.id {
            AdoptionStatus::Accepted
        } else {
            AdoptionStatus::RejectedAdopted
        };
        assert_eq!(adoption.status, expected, "application {}", adoption.id);
    }

    // Every remaining decision is refused once the animal is placed.
    for adoption in applications.iter().filter(|adoption| adoption.id != winner.id) {
        for decision in [Decision::Accept, Decision::Reject] {
            let result = coordinator.decide_adoption(&staff(), adoption.id, decision);
            assert_eq!(OutcomeKind::of(&result), OutcomeKind::InvalidTransition);
        }
    }

    let late = coordinator.apply_for_adoption(&applicant(99), animal.id, "too late");
    assert_eq!(OutcomeKind::of(&late), OutcomeKind::AlreadyPlaced);
}

#[test]
fn rejections_return_animal_to_catalog_only_when_none_pending() {
    let coordinator = TransitionCoordinator::new(Arc::new(InMemoryStore::default()));
    let animal = coordinator
        .create_animal(&staff(), kitten("Pepper"))
        .expect("animal registered");

    let first = coordinator
        .apply_for_adoption(&applicant(10), animal.id, "first")
        .expect("first");
    let second = coordinator
        .apply_for_adoption(&applicant(11), animal.id, "second")
        .expect("second");

    let receipt = coordinator
        .decide_adoption(&staff(), first.id, Decision::Reject)
        .expect("reject first");
    assert_eq!(receipt.animal.status, AnimalStatus::InAdoption);

    let receipt = coordinator
        .decide_adoption(&staff(), second.id, Decision::Reject)
        .expect("reject second");
    assert_eq!(receipt.animal.status, AnimalStatus::Available);

    let catalog = coordinator.list_animals().expect("catalog");
    assert_eq!(catalog[0].id, animal.id);
    assert_eq!(catalog[0].status, AnimalStatus::Available);

    // A rejected applicant cannot reapply to the same animal.
    let again = coordinator.apply_for_adoption(&applicant(10), animal.id, "again");
    assert_eq!(OutcomeKind::of(&again), OutcomeKind::DuplicateApplication);
}
