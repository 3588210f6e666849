//! SQLite-backed entity store.
//!
//! Each unit of work opens its own connection and starts with `BEGIN IMMEDIATE`,
//! which takes the database write lock up front. The connection's busy timeout
//! bounds how long a transaction waits for that lock, so the per-animal lock
//! contract holds (coarser than a row lock, never weaker). Read-only work runs
//! in a deferred transaction and is not blocked by writers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use super::domain::{
    Adoption, AdoptionId, AdoptionStatus, Animal, AnimalId, AnimalProfile, AnimalStatus, Gender,
    NewAdoption, NewAnimal, UserId,
};
use super::store::{AdoptionFilter, EntityStore, StoreError, StoreTransaction};

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS animals (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        age_in_months INTEGER NOT NULL,
        breed TEXT NOT NULL,
        gender TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'available',
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS adoptions (
        id INTEGER PRIMARY KEY,
        animal_id INTEGER NOT NULL REFERENCES animals(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL,
        application_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        contact_info TEXT NOT NULL,
        UNIQUE (animal_id, user_id)
    );

    CREATE INDEX IF NOT EXISTS idx_animals_status ON animals(status);
    CREATE INDEX IF NOT EXISTS idx_adoptions_animal_status ON adoptions(animal_id, status);
    CREATE INDEX IF NOT EXISTS idx_adoptions_application_date ON adoptions(application_date);
";

const ANIMAL_COLUMNS: &str =
    "id, name, description, age_in_months, breed, gender, status, created_at";
const ADOPTION_COLUMNS: &str =
    "id, animal_id, user_id, application_date, status, contact_info";

// NULL status / excluding parameters disable the corresponding predicate.
const FILTER_CLAUSE: &str =
    "animal_id = ?1 AND (?2 IS NULL OR status = ?2) AND (?3 IS NULL OR id != ?3)";

pub struct SqliteStore {
    path: PathBuf,
    lock_timeout: Duration,
}

impl SqliteStore {
    /// Open or create the database at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>, lock_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    StoreError::Unavailable(format!(
                        "failed to create directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }

        let store = Self { path, lock_timeout };
        let conn = store.connect()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(map_sqlite_error)?;
        conn.execute_batch(SCHEMA).map_err(map_sqlite_error)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path).map_err(|err| {
            StoreError::Unavailable(format!(
                "failed to open database at {}: {err}",
                self.path.display()
            ))
        })?;
        conn.busy_timeout(self.lock_timeout)
            .map_err(map_sqlite_error)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(map_sqlite_error)?;
        Ok(conn)
    }
}

impl SqliteStore {
    fn run<T, E, F>(&self, behavior: TransactionBehavior, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(map_sqlite_error)?;

        let value = {
            let mut handle = SqliteTransaction { conn: &tx };
            work(&mut handle)?
        };

        tx.commit().map_err(map_sqlite_error)?;
        Ok(value)
    }
}

impl EntityStore for SqliteStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.run(TransactionBehavior::Immediate, work)
    }

    /// Deferred transaction: under WAL it reads the last committed snapshot
    /// and never waits for a writer.
    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.run(TransactionBehavior::Deferred, work)
    }
}

struct SqliteTransaction<'c> {
    conn: &'c Connection,
}

impl SqliteTransaction<'_> {
    fn query_adoptions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Adoption>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(map_sqlite_error)?;
        let rows = stmt
            .query_map(params, RawAdoption::from_row)
            .map_err(map_sqlite_error)?;

        let mut adoptions = Vec::new();
        for row in rows {
            adoptions.push(row.map_err(map_sqlite_error)?.decode()?);
        }
        Ok(adoptions)
    }
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn load_animal(&mut self, id: AnimalId) -> Result<Option<Animal>, StoreError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {ANIMAL_COLUMNS} FROM animals WHERE id = ?1"),
                params![id.0],
                RawAnimal::from_row,
            )
            .optional()
            .map_err(map_sqlite_error)?;
        raw.map(RawAnimal::decode).transpose()
    }

    fn load_animal_for_update(&mut self, id: AnimalId) -> Result<Option<Animal>, StoreError> {
        // The IMMEDIATE transaction already holds the write lock.
        self.load_animal(id)
    }

    fn list_animals(&mut self) -> Result<Vec<Animal>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ANIMAL_COLUMNS} FROM animals ORDER BY id"))
            .map_err(map_sqlite_error)?;
        let rows = stmt
            .query_map([], RawAnimal::from_row)
            .map_err(map_sqlite_error)?;

        let mut animals = Vec::new();
        for row in rows {
            animals.push(row.map_err(map_sqlite_error)?.decode()?);
        }
        Ok(animals)
    }

    fn insert_animal(&mut self, animal: NewAnimal) -> Result<Animal, StoreError> {
        let NewAnimal {
            profile,
            status,
            created_at,
        } = animal;
        let created_at = stored_precision(created_at);

        self.conn
            .execute(
                "INSERT INTO animals (name, description, age_in_months, breed, gender, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    profile.name,
                    profile.description,
                    profile.age_in_months,
                    profile.breed,
                    profile.gender.label(),
                    status.label(),
                    encode_timestamp(created_at),
                ],
            )
            .map_err(map_sqlite_error)?;

        Ok(Animal {
            id: AnimalId(self.conn.last_insert_rowid()),
            profile,
            status,
            created_at,
        })
    }

    fn save_animal(&mut self, animal: &Animal) -> Result<(), StoreError> {
        let updated = self
            .conn
            .execute(
                "UPDATE animals
                 SET name = ?2, description = ?3, age_in_months = ?4, breed = ?5, gender = ?6, status = ?7
                 WHERE id = ?1",
                params![
                    animal.id.0,
                    animal.profile.name,
                    animal.profile.description,
                    animal.profile.age_in_months,
                    animal.profile.breed,
                    animal.profile.gender.label(),
                    animal.status.label(),
                ],
            )
            .map_err(map_sqlite_error)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn delete_animal(&mut self, id: AnimalId) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM animals WHERE id = ?1", params![id.0])
            .map_err(map_sqlite_error)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn load_adoption(&mut self, id: AdoptionId) -> Result<Option<Adoption>, StoreError> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {ADOPTION_COLUMNS} FROM adoptions WHERE id = ?1"),
                params![id.0],
                RawAdoption::from_row,
            )
            .optional()
            .map_err(map_sqlite_error)?;
        raw.map(RawAdoption::decode).transpose()
    }

    fn find_adoption(
        &mut self,
        animal_id: AnimalId,
        user_id: UserId,
    ) -> Result<Option<Adoption>, StoreError> {
        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ADOPTION_COLUMNS} FROM adoptions WHERE animal_id = ?1 AND user_id = ?2"
                ),
                params![animal_id.0, user_id.0],
                RawAdoption::from_row,
            )
            .optional()
            .map_err(map_sqlite_error)?;
        raw.map(RawAdoption::decode).transpose()
    }

    fn adoptions(&mut self, filter: &AdoptionFilter) -> Result<Vec<Adoption>, StoreError> {
        let (animal_id, status, excluding) = filter_params(filter);
        self.query_adoptions(
            &format!("SELECT {ADOPTION_COLUMNS} FROM adoptions WHERE {FILTER_CLAUSE} ORDER BY id"),
            params![animal_id, status, excluding],
        )
    }

    fn count_adoptions(&mut self, filter: &AdoptionFilter) -> Result<usize, StoreError> {
        let (animal_id, status, excluding) = filter_params(filter);
        let count: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM adoptions WHERE {FILTER_CLAUSE}"),
                params![animal_id, status, excluding],
                |row| row.get(0),
            )
            .map_err(map_sqlite_error)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn insert_adoption(&mut self, adoption: NewAdoption) -> Result<Adoption, StoreError> {
        let NewAdoption {
            animal_id,
            user_id,
            contact_info,
            application_date,
        } = adoption;
        let application_date = stored_precision(application_date);

        self.conn
            .execute(
                "INSERT INTO adoptions (animal_id, user_id, application_date, status, contact_info)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    animal_id.0,
                    user_id.0,
                    encode_timestamp(application_date),
                    AdoptionStatus::Pending.label(),
                    contact_info,
                ],
            )
            .map_err(map_sqlite_error)?;

        Ok(Adoption {
            id: AdoptionId(self.conn.last_insert_rowid()),
            animal_id,
            user_id,
            status: AdoptionStatus::Pending,
            application_date,
            contact_info,
        })
    }

    fn save_adoption(&mut self, adoption: &Adoption) -> Result<(), StoreError> {
        // Only the status is mutable after creation.
        let updated = self
            .conn
            .execute(
                "UPDATE adoptions SET status = ?2 WHERE id = ?1",
                params![adoption.id.0, adoption.status.label()],
            )
            .map_err(map_sqlite_error)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn bulk_update_status(
        &mut self,
        filter: &AdoptionFilter,
        status: AdoptionStatus,
    ) -> Result<usize, StoreError> {
        let (animal_id, from, excluding) = filter_params(filter);
        let updated = self
            .conn
            .execute(
                &format!("UPDATE adoptions SET status = ?4 WHERE {FILTER_CLAUSE}"),
                params![animal_id, from, excluding, status.label()],
            )
            .map_err(map_sqlite_error)?;
        debug!(animal_id, updated, to = status.label(), "bulk adoption status update");
        Ok(updated)
    }
}

fn filter_params(filter: &AdoptionFilter) -> (i64, Option<&'static str>, Option<i64>) {
    (
        filter.animal_id.0,
        filter.status.map(AdoptionStatus::label),
        filter.excluding.map(|id| id.0),
    )
}

struct RawAnimal {
    id: i64,
    name: String,
    description: String,
    age_in_months: u32,
    breed: String,
    gender: String,
    status: String,
    created_at: String,
}

impl RawAnimal {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            age_in_months: row.get(3)?,
            breed: row.get(4)?,
            gender: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn decode(self) -> Result<Animal, StoreError> {
        let gender = Gender::from_label(&self.gender)
            .ok_or_else(|| corrupt("animal", self.id, "gender", &self.gender))?;
        let status = AnimalStatus::from_label(&self.status)
            .ok_or_else(|| corrupt("animal", self.id, "status", &self.status))?;
        let created_at = decode_timestamp(&self.created_at)
            .ok_or_else(|| corrupt("animal", self.id, "created_at", &self.created_at))?;

        Ok(Animal {
            id: AnimalId(self.id),
            profile: AnimalProfile {
                name: self.name,
                description: self.description,
                age_in_months: self.age_in_months,
                breed: self.breed,
                gender,
            },
            status,
            created_at,
        })
    }
}

struct RawAdoption {
    id: i64,
    animal_id: i64,
    user_id: i64,
    application_date: String,
    status: String,
    contact_info: String,
}

impl RawAdoption {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            animal_id: row.get(1)?,
            user_id: row.get(2)?,
            application_date: row.get(3)?,
            status: row.get(4)?,
            contact_info: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Adoption, StoreError> {
        let status = AdoptionStatus::from_label(&self.status)
            .ok_or_else(|| corrupt("adoption", self.id, "status", &self.status))?;
        let application_date = decode_timestamp(&self.application_date).ok_or_else(|| {
            corrupt("adoption", self.id, "application_date", &self.application_date)
        })?;

        Ok(Adoption {
            id: AdoptionId(self.id),
            animal_id: AnimalId(self.animal_id),
            user_id: UserId(self.user_id),
            status,
            application_date,
            contact_info: self.contact_info,
        })
    }
}

fn corrupt(table: &str, id: i64, column: &str, value: &str) -> StoreError {
    StoreError::Unavailable(format!("{table} {id} has unreadable {column} '{value}'"))
}

/// Timestamps are persisted with microsecond precision; inserts hand back the
/// value as it will read back.
fn stored_precision(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(6)
}

fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            StoreError::LockTimeout(format!("database write lock ({err})"))
        }
        Some(ErrorCode::ConstraintViolation) => StoreError::Conflict(err.to_string()),
        _ => StoreError::Unavailable(err.to_string()),
    }
}
