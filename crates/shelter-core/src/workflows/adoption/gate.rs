use std::fmt;

use serde::Serialize;

use super::domain::{Decision, Identity, Role};

/// Operations guarded by role checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Apply,
    Accept,
    Reject,
    CreateAnimal,
    EditAnimal,
    DeleteAnimal,
    ViewApplications,
}

impl Action {
    pub const fn label(self) -> &'static str {
        match self {
            Action::Apply => "apply",
            Action::Accept => "accept",
            Action::Reject => "reject",
            Action::CreateAnimal => "create_animal",
            Action::EditAnimal => "edit_animal",
            Action::DeleteAnimal => "delete_animal",
            Action::ViewApplications => "view_applications",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<Decision> for Action {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Accept => Action::Accept,
            Decision::Reject => Action::Reject,
        }
    }
}

/// Static role table. Independent of any lifecycle state.
pub const fn permit(role: Role, action: Action) -> bool {
    match action {
        Action::Apply => matches!(role, Role::User),
        Action::CreateAnimal | Action::DeleteAnimal => matches!(role, Role::Admin),
        Action::Accept | Action::Reject | Action::EditAnimal | Action::ViewApplications => {
            role.is_staff()
        }
    }
}

/// Denial raised before any store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("insufficient privilege: role {role} may not {action}")]
pub struct Forbidden {
    pub role: Role,
    pub action: Action,
}

pub fn authorize(identity: &Identity, action: Action) -> Result<(), Forbidden> {
    if permit(identity.role, action) {
        Ok(())
    } else {
        Err(Forbidden {
            role: identity.role,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::adoption::domain::UserId;

    #[test]
    fn only_plain_users_may_apply() {
        assert!(permit(Role::User, Action::Apply));
        assert!(!permit(Role::Admin, Action::Apply));
        assert!(!permit(Role::Moderator, Action::Apply));
    }

    #[test]
    fn staff_decide_applications() {
        for action in [Action::Accept, Action::Reject, Action::EditAnimal] {
            assert!(permit(Role::Admin, action), "admin may {action}");
            assert!(permit(Role::Moderator, action), "moderator may {action}");
            assert!(!permit(Role::User, action), "user may not {action}");
        }
    }

    #[test]
    fn animal_lifecycle_is_admin_only() {
        for action in [Action::CreateAnimal, Action::DeleteAnimal] {
            assert!(permit(Role::Admin, action));
            assert!(!permit(Role::Moderator, action));
            assert!(!permit(Role::User, action));
        }
    }

    #[test]
    fn authorize_reports_role_and_action() {
        let identity = Identity::new(UserId(7), Role::User);
        let denial = authorize(&identity, Action::from(Decision::Accept)).unwrap_err();
        assert_eq!(denial.role, Role::User);
        assert_eq!(denial.action, Action::Accept);
        assert!(denial.to_string().contains("insufficient privilege"));
    }
}
