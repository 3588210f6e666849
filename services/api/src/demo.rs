use crate::infra::coordinator;
use chrono::Local;
use clap::Args;
use shelter_core::config::StoreConfig;
use shelter_core::error::AppError;
use shelter_core::workflows::adoption::{
    AdoptionError, AnimalId, AnimalProfile, Decision, EntityStore, Gender, Identity,
    InMemoryStore, OutcomeKind, Role, SqliteStore, TransitionCoordinator, UserId,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Run against a SQLite database file instead of process memory.
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
    /// Number of competing applicants in the placement scenario.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub(crate) applicants: u8,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        database,
        applicants,
    } = args;
    let lock_timeout = Duration::from_millis(StoreConfig::DEFAULT_LOCK_TIMEOUT_MS);

    println!(
        "Shelter adoption demo ({})",
        Local::now().format("%Y-%m-%d %H:%M")
    );
    match database {
        Some(path) => {
            println!("Store: sqlite at {}", path.display());
            let store = SqliteStore::open(&path, lock_timeout)?;
            play_scenarios(&coordinator(store), applicants)
        }
        None => {
            println!("Store: in-memory");
            let store = InMemoryStore::with_lock_timeout(lock_timeout);
            play_scenarios(&coordinator(store), applicants)
        }
    }
}

fn play_scenarios<S>(coordinator: &TransitionCoordinator<S>, applicants: u8) -> Result<(), AppError>
where
    S: EntityStore + 'static,
{
    let admin = Identity::new(UserId(1), Role::Admin);
    let moderator = Identity::new(UserId(2), Role::Moderator);

    println!("\nPlacement: {applicants} applicants compete, one is accepted");
    let rex = coordinator.create_animal(&admin, profile("Rex", Gender::Male))?;
    print_status(coordinator, rex.id)?;

    let mut filed = Vec::new();
    for offset in 0..i64::from(applicants) {
        let applicant = Identity::new(UserId(100 + offset), Role::User);
        let adoption = coordinator.apply_for_adoption(
            &applicant,
            rex.id,
            &format!("applicant{}@example.org", 100 + offset),
        )?;
        println!(
            "  user {} applied (application {})",
            adoption.user_id, adoption.id
        );
        filed.push(adoption);
    }
    print_status(coordinator, rex.id)?;

    let receipt = coordinator.decide_adoption(&moderator, filed[0].id, Decision::Accept)?;
    println!(
        "  application {} accepted; {} competing application(s) closed",
        receipt.adoption.id, receipt.siblings_closed
    );
    print_status(coordinator, rex.id)?;

    let late = coordinator.apply_for_adoption(
        &Identity::new(UserId(999), Role::User),
        rex.id,
        "late@example.org",
    );
    report_refusal("late application", &late);
    if let Some(sibling) = filed.get(1) {
        let retry = coordinator.decide_adoption(&moderator, sibling.id, Decision::Accept);
        report_refusal("accepting a closed sibling", &retry);
    }

    println!("\nRejection: the only applicant is turned down");
    let bella = coordinator.create_animal(&admin, profile("Bella", Gender::Female))?;
    let adoption = coordinator.apply_for_adoption(
        &Identity::new(UserId(200), Role::User),
        bella.id,
        "bella@example.org",
    )?;
    print_status(coordinator, bella.id)?;
    coordinator.decide_adoption(&admin, adoption.id, Decision::Reject)?;
    print_status(coordinator, bella.id)?;
    let again = coordinator.decide_adoption(&admin, adoption.id, Decision::Reject);
    report_refusal("rejecting twice", &again);

    println!("\nCatalog");
    for animal in coordinator.list_animals()? {
        println!("  {:<8} {}", animal.profile.name, animal.status);
    }
    Ok(())
}

fn profile(name: &str, gender: Gender) -> AnimalProfile {
    AnimalProfile {
        name: name.to_string(),
        description: format!("{name} is waiting for a home"),
        age_in_months: 24,
        breed: "Mixed".to_string(),
        gender,
    }
}

fn print_status<S>(coordinator: &TransitionCoordinator<S>, animal_id: AnimalId) -> Result<(), AppError>
where
    S: EntityStore + 'static,
{
    let staff = Identity::new(UserId(1), Role::Admin);
    let view = coordinator.animal_view(Some(&staff), animal_id)?;
    let applications: Vec<String> = view
        .adoptions
        .iter()
        .map(|adoption| format!("#{}={}", adoption.id, adoption.status))
        .collect();
    println!(
        "  {} is {} [{}]",
        view.animal.profile.name,
        view.animal.status,
        applications.join(", ")
    );
    Ok(())
}

fn report_refusal<T>(label: &str, result: &Result<T, AdoptionError>) {
    match result {
        Ok(_) => println!("  {label}: unexpectedly succeeded"),
        Err(err) => println!("  {label}: {} ({err})", OutcomeKind::of(result).label()),
    }
}
