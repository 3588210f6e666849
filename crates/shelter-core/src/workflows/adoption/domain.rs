use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for shelter animals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnimalId(pub i64);

/// Identifier wrapper for adoption applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AdoptionId(pub i64);

/// Identifier of an account resolved by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for AnimalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AdoptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account role supplied alongside a verified identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Moderator,
    User,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::User => "user",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "moderator" => Some(Role::Moderator),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    pub const fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Verified caller identity passed explicitly into every boundary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// Placement status of an animal, derived from its applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimalStatus {
    Available,
    InAdoption,
    Adopted,
}

impl AnimalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AnimalStatus::Available => "available",
            AnimalStatus::InAdoption => "in_adoption",
            AnimalStatus::Adopted => "adopted",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "available" => Some(AnimalStatus::Available),
            "in_adoption" => Some(AnimalStatus::InAdoption),
            "adopted" => Some(AnimalStatus::Adopted),
            _ => None,
        }
    }

    /// Catalog ordering: animals still looking for a home come first.
    pub const fn catalog_rank(self) -> u8 {
        match self {
            AnimalStatus::Available => 1,
            AnimalStatus::InAdoption => 2,
            AnimalStatus::Adopted => 3,
        }
    }
}

impl fmt::Display for AnimalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of a single adoption application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdoptionStatus {
    Pending,
    Accepted,
    Rejected,
    /// Closed by the system because a sibling application was accepted.
    RejectedAdopted,
}

impl AdoptionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AdoptionStatus::Pending => "pending",
            AdoptionStatus::Accepted => "accepted",
            AdoptionStatus::Rejected => "rejected",
            AdoptionStatus::RejectedAdopted => "rejected_adopted",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AdoptionStatus::Pending),
            "accepted" => Some(AdoptionStatus::Accepted),
            "rejected" => Some(AdoptionStatus::Rejected),
            "rejected_adopted" => Some(AdoptionStatus::RejectedAdopted),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, AdoptionStatus::Pending)
    }
}

impl fmt::Display for AdoptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const fn label(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// Descriptive fields staff maintain for an animal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalProfile {
    pub name: String,
    pub description: String,
    pub age_in_months: u32,
    pub breed: String,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animal {
    pub id: AnimalId,
    #[serde(flatten)]
    pub profile: AnimalProfile,
    pub status: AnimalStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the entity store; the store assigns the identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnimal {
    pub profile: AnimalProfile,
    pub status: AnimalStatus,
    pub created_at: DateTime<Utc>,
}

/// Staff edit request. `status` may only be overridden while no applications exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalUpdate {
    #[serde(flatten)]
    pub profile: AnimalProfile,
    #[serde(default)]
    pub status: Option<AnimalStatus>,
}

/// One user's application to adopt one animal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adoption {
    pub id: AdoptionId,
    pub animal_id: AnimalId,
    pub user_id: UserId,
    pub status: AdoptionStatus,
    pub application_date: DateTime<Utc>,
    pub contact_info: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAdoption {
    pub animal_id: AnimalId,
    pub user_id: UserId,
    pub contact_info: String,
    pub application_date: DateTime<Utc>,
}

/// Staff decision on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Reject => "reject",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "accept" => Some(Decision::Accept),
            "reject" => Some(Decision::Reject),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-only projection of an animal and the applications visible to the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimalView {
    pub animal: Animal,
    pub adoptions: Vec<Adoption>,
}

/// Result of a staff decision, echoing every row the transaction touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionReceipt {
    pub adoption: Adoption,
    pub animal: Animal,
    pub siblings_closed: usize,
}

/// Newest applications first; ties fall back to the higher id.
pub fn sort_by_application_date_desc(adoptions: &mut [Adoption]) {
    adoptions.sort_by(|left, right| {
        right
            .application_date
            .cmp(&left.application_date)
            .then_with(|| right.id.cmp(&left.id))
    });
}
