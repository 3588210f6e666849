use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::workflows::adoption::domain::{
    Animal, AnimalProfile, Gender, Identity, Role, UserId,
};
use crate::workflows::adoption::memory::InMemoryStore;
use crate::workflows::adoption::store::{EntityStore, StoreError, StoreTransaction};
use crate::workflows::adoption::TransitionCoordinator;

pub(super) fn profile(name: &str) -> AnimalProfile {
    AnimalProfile {
        name: name.to_string(),
        description: "Friendly, house-trained, good with children".to_string(),
        age_in_months: 18,
        breed: "Labrador mix".to_string(),
        gender: Gender::Male,
    }
}

pub(super) fn admin() -> Identity {
    Identity::new(UserId(1), Role::Admin)
}

pub(super) fn moderator() -> Identity {
    Identity::new(UserId(2), Role::Moderator)
}

pub(super) fn user(id: i64) -> Identity {
    Identity::new(UserId(id), Role::User)
}

pub(super) fn build_coordinator() -> (TransitionCoordinator<InMemoryStore>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::default());
    let coordinator = TransitionCoordinator::new(store.clone());
    (coordinator, store)
}

pub(super) fn seed_animal<S>(coordinator: &TransitionCoordinator<S>, name: &str) -> Animal
where
    S: EntityStore + 'static,
{
    coordinator
        .create_animal(&admin(), profile(name))
        .expect("admin can register animals")
}

/// Delegating store that records how many transactions were opened.
#[derive(Default)]
pub(super) struct CountingStore {
    inner: InMemoryStore,
    transactions: AtomicUsize,
}

impl CountingStore {
    pub(super) fn transactions(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }
}

impl EntityStore for CountingStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.transactions.fetch_add(1, Ordering::SeqCst);
        self.inner.transaction(work)
    }
}

pub(super) struct UnavailableStore;

impl EntityStore for UnavailableStore {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        Err(E::from(StoreError::Unavailable("database offline".to_string())))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
