//! Process-local entity store.
//!
//! Writes are staged per transaction and applied to the shared tables in one
//! step at commit. Per-animal write locks live in a separate table guarded by a
//! condition variable so waiters can give up after the configured timeout.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::domain::{
    Adoption, AdoptionId, AdoptionStatus, Animal, AnimalId, NewAdoption, NewAnimal, UserId,
};
use super::store::{AdoptionFilter, EntityStore, StoreError, StoreTransaction};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
    lock_timeout: Duration,
}

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    locks: Mutex<HashSet<AnimalId>>,
    released: Condvar,
}

#[derive(Default)]
struct Tables {
    animals: BTreeMap<AnimalId, Animal>,
    adoptions: BTreeMap<AdoptionId, Adoption>,
    animal_sequence: i64,
    adoption_sequence: i64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryStore {
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            lock_timeout,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }
}

impl EntityStore for InMemoryStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut tx = MemoryTransaction {
            shared: &self.shared,
            lock_timeout: self.lock_timeout,
            held: Vec::new(),
            staged_animals: BTreeMap::new(),
            staged_adoptions: BTreeMap::new(),
        };

        let value = work(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }
}

/// Open unit of work. Dropping it without `commit` discards the staged writes;
/// either way the held animal locks are released on drop.
struct MemoryTransaction<'s> {
    shared: &'s Shared,
    lock_timeout: Duration,
    held: Vec<AnimalId>,
    // `None` marks a staged delete.
    staged_animals: BTreeMap<AnimalId, Option<Animal>>,
    staged_adoptions: BTreeMap<AdoptionId, Option<Adoption>>,
}

impl MemoryTransaction<'_> {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.shared
            .tables
            .lock()
            .map_err(|_| StoreError::Unavailable("table mutex poisoned".to_string()))
    }

    fn acquire(&mut self, id: AnimalId) -> Result<(), StoreError> {
        if self.held.contains(&id) {
            return Ok(());
        }

        let deadline = Instant::now() + self.lock_timeout;
        let mut locks = self
            .shared
            .locks
            .lock()
            .map_err(|_| StoreError::Unavailable("lock table poisoned".to_string()))?;

        while locks.contains(&id) {
            let now = Instant::now();
            if now >= deadline {
                debug!(animal_id = %id, "animal lock wait exhausted");
                return Err(StoreError::LockTimeout(format!("animal {id}")));
            }
            let (guard, _) = self
                .shared
                .released
                .wait_timeout(locks, deadline - now)
                .map_err(|_| StoreError::Unavailable("lock table poisoned".to_string()))?;
            locks = guard;
        }

        locks.insert(id);
        self.held.push(id);
        Ok(())
    }

    fn current_animal(&self, id: AnimalId) -> Result<Option<Animal>, StoreError> {
        if let Some(staged) = self.staged_animals.get(&id) {
            return Ok(staged.clone());
        }
        Ok(self.tables()?.animals.get(&id).cloned())
    }

    fn current_adoption(&self, id: AdoptionId) -> Result<Option<Adoption>, StoreError> {
        if let Some(staged) = self.staged_adoptions.get(&id) {
            return Ok(staged.clone());
        }
        Ok(self.tables()?.adoptions.get(&id).cloned())
    }

    /// Committed rows overlaid with this transaction's staged writes.
    fn visible_adoptions<P>(&self, predicate: P) -> Result<Vec<Adoption>, StoreError>
    where
        P: Fn(&Adoption) -> bool,
    {
        let tables = self.tables()?;
        let mut rows: Vec<Adoption> = tables
            .adoptions
            .values()
            .filter(|row| !self.staged_adoptions.contains_key(&row.id))
            .filter(|&row| predicate(row))
            .cloned()
            .collect();
        rows.extend(
            self.staged_adoptions
                .values()
                .flatten()
                .filter(|&row| predicate(row))
                .cloned(),
        );
        rows.sort_by_key(|row| row.id);
        Ok(rows)
    }

    fn commit(mut self) -> Result<(), StoreError> {
        let staged_animals = std::mem::take(&mut self.staged_animals);
        let staged_adoptions = std::mem::take(&mut self.staged_adoptions);
        let mut tables = self.tables()?;

        for (id, row) in &staged_adoptions {
            let Some(row) = row else { continue };
            let clash = tables.adoptions.values().any(|existing| {
                existing.id != *id
                    && existing.animal_id == row.animal_id
                    && existing.user_id == row.user_id
                    && !matches!(staged_adoptions.get(&existing.id), Some(None))
            });
            if clash {
                return Err(StoreError::Conflict(format!(
                    "user {} already applied for animal {}",
                    row.user_id, row.animal_id
                )));
            }
        }

        for (id, row) in staged_animals {
            match row {
                Some(animal) => {
                    tables.animals.insert(id, animal);
                }
                None => {
                    tables.animals.remove(&id);
                    tables.adoptions.retain(|_, adoption| adoption.animal_id != id);
                }
            }
        }
        for (id, row) in staged_adoptions {
            match row {
                Some(adoption) => {
                    tables.adoptions.insert(id, adoption);
                }
                None => {
                    tables.adoptions.remove(&id);
                }
            }
        }
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let mut locks = self
            .shared
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for id in self.held.drain(..) {
            locks.remove(&id);
        }
        self.shared.released.notify_all();
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn load_animal(&mut self, id: AnimalId) -> Result<Option<Animal>, StoreError> {
        self.current_animal(id)
    }

    fn load_animal_for_update(&mut self, id: AnimalId) -> Result<Option<Animal>, StoreError> {
        self.acquire(id)?;
        self.current_animal(id)
    }

    fn list_animals(&mut self) -> Result<Vec<Animal>, StoreError> {
        let tables = self.tables()?;
        let mut rows: Vec<Animal> = tables
            .animals
            .values()
            .filter(|row| !self.staged_animals.contains_key(&row.id))
            .cloned()
            .collect();
        rows.extend(self.staged_animals.values().flatten().cloned());
        Ok(rows)
    }

    fn insert_animal(&mut self, animal: NewAnimal) -> Result<Animal, StoreError> {
        let id = {
            let mut tables = self.tables()?;
            tables.animal_sequence += 1;
            AnimalId(tables.animal_sequence)
        };
        let row = Animal {
            id,
            profile: animal.profile,
            status: animal.status,
            created_at: animal.created_at,
        };
        self.staged_animals.insert(id, Some(row.clone()));
        Ok(row)
    }

    fn save_animal(&mut self, animal: &Animal) -> Result<(), StoreError> {
        if self.current_animal(animal.id)?.is_none() {
            return Err(StoreError::NotFound);
        }
        self.staged_animals.insert(animal.id, Some(animal.clone()));
        Ok(())
    }

    fn delete_animal(&mut self, id: AnimalId) -> Result<(), StoreError> {
        if self.current_animal(id)?.is_none() {
            return Err(StoreError::NotFound);
        }
        let children = self.visible_adoptions(|row| row.animal_id == id)?;
        for child in children {
            self.staged_adoptions.insert(child.id, None);
        }
        self.staged_animals.insert(id, None);
        Ok(())
    }

    fn load_adoption(&mut self, id: AdoptionId) -> Result<Option<Adoption>, StoreError> {
        self.current_adoption(id)
    }

    fn find_adoption(
        &mut self,
        animal_id: AnimalId,
        user_id: UserId,
    ) -> Result<Option<Adoption>, StoreError> {
        let rows =
            self.visible_adoptions(|row| row.animal_id == animal_id && row.user_id == user_id)?;
        Ok(rows.into_iter().next())
    }

    fn adoptions(&mut self, filter: &AdoptionFilter) -> Result<Vec<Adoption>, StoreError> {
        self.visible_adoptions(|row| filter.matches(row))
    }

    fn count_adoptions(&mut self, filter: &AdoptionFilter) -> Result<usize, StoreError> {
        Ok(self.visible_adoptions(|row| filter.matches(row))?.len())
    }

    fn insert_adoption(&mut self, adoption: NewAdoption) -> Result<Adoption, StoreError> {
        if self.current_animal(adoption.animal_id)?.is_none() {
            return Err(StoreError::NotFound);
        }
        if self
            .find_adoption(adoption.animal_id, adoption.user_id)?
            .is_some()
        {
            return Err(StoreError::Conflict(format!(
                "user {} already applied for animal {}",
                adoption.user_id, adoption.animal_id
            )));
        }

        let id = {
            let mut tables = self.tables()?;
            tables.adoption_sequence += 1;
            AdoptionId(tables.adoption_sequence)
        };
        let row = Adoption {
            id,
            animal_id: adoption.animal_id,
            user_id: adoption.user_id,
            status: AdoptionStatus::Pending,
            application_date: adoption.application_date,
            contact_info: adoption.contact_info,
        };
        self.staged_adoptions.insert(id, Some(row.clone()));
        Ok(row)
    }

    fn save_adoption(&mut self, adoption: &Adoption) -> Result<(), StoreError> {
        if self.current_adoption(adoption.id)?.is_none() {
            return Err(StoreError::NotFound);
        }
        self.staged_adoptions
            .insert(adoption.id, Some(adoption.clone()));
        Ok(())
    }

    fn bulk_update_status(
        &mut self,
        filter: &AdoptionFilter,
        status: AdoptionStatus,
    ) -> Result<usize, StoreError> {
        let matched = self.visible_adoptions(|row| filter.matches(row))?;
        let updated = matched.len();
        for mut row in matched {
            row.status = status;
            self.staged_adoptions.insert(row.id, Some(row));
        }
        Ok(updated)
    }
}
