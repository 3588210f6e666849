use super::domain::{
    Adoption, AdoptionId, AdoptionStatus, Animal, AnimalId, NewAdoption, NewAnimal, UserId,
};

/// Transactional storage for animals and their applications.
///
/// `transaction` runs `work` inside a single atomic unit: returning `Ok`
/// commits every write, returning `Err` discards them. Locks taken through
/// [`StoreTransaction::load_animal_for_update`] are held until the unit ends.
pub trait EntityStore: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>;

    /// Read-only unit of work. It must not take or wait for animal locks, so
    /// projections stay available while transitions are in flight. Stores
    /// whose transactions only lock on `load_animal_for_update` can rely on
    /// the default.
    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.transaction(work)
    }
}

/// Operations available inside an open transaction.
pub trait StoreTransaction {
    fn load_animal(&mut self, id: AnimalId) -> Result<Option<Animal>, StoreError>;

    /// Load an animal and hold its write lock until the transaction ends.
    fn load_animal_for_update(&mut self, id: AnimalId) -> Result<Option<Animal>, StoreError>;

    fn list_animals(&mut self) -> Result<Vec<Animal>, StoreError>;

    fn insert_animal(&mut self, animal: NewAnimal) -> Result<Animal, StoreError>;

    fn save_animal(&mut self, animal: &Animal) -> Result<(), StoreError>;

    /// Remove an animal together with all of its applications.
    fn delete_animal(&mut self, id: AnimalId) -> Result<(), StoreError>;

    fn load_adoption(&mut self, id: AdoptionId) -> Result<Option<Adoption>, StoreError>;

    fn find_adoption(
        &mut self,
        animal_id: AnimalId,
        user_id: UserId,
    ) -> Result<Option<Adoption>, StoreError>;

    fn adoptions(&mut self, filter: &AdoptionFilter) -> Result<Vec<Adoption>, StoreError>;

    fn count_adoptions(&mut self, filter: &AdoptionFilter) -> Result<usize, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the user already applied for the animal.
    fn insert_adoption(&mut self, adoption: NewAdoption) -> Result<Adoption, StoreError>;

    fn save_adoption(&mut self, adoption: &Adoption) -> Result<(), StoreError>;

    /// Set `status` on every application matching `filter`, returning the number updated.
    fn bulk_update_status(
        &mut self,
        filter: &AdoptionFilter,
        status: AdoptionStatus,
    ) -> Result<usize, StoreError>;
}

/// Predicate over the applications of one animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdoptionFilter {
    pub animal_id: AnimalId,
    pub status: Option<AdoptionStatus>,
    pub excluding: Option<AdoptionId>,
}

impl AdoptionFilter {
    pub fn for_animal(animal_id: AnimalId) -> Self {
        Self {
            animal_id,
            status: None,
            excluding: None,
        }
    }

    pub fn with_status(mut self, status: AdoptionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn excluding(mut self, id: AdoptionId) -> Self {
        self.excluding = Some(id);
        self
    }

    pub fn matches(&self, adoption: &Adoption) -> bool {
        adoption.animal_id == self.animal_id
            && self.status.map_or(true, |status| adoption.status == status)
            && self.excluding.map_or(true, |id| adoption.id != id)
    }
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("constraint violated: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("timed out waiting for lock on {0}")]
    LockTimeout(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
