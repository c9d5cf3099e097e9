use crate::error::{PayoutError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ActorId = Uuid;

/// Role attached to an authenticated caller by the external identity
/// provider. The engine trusts it for audit attribution and authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mentor,
    Admin,
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn mentor(id: ActorId) -> Self {
        Self {
            id,
            role: Role::Mentor,
        }
    }

    pub fn admin(id: ActorId) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Approval, rejection, sending and payment are admin operations.
    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(PayoutError::Unauthorized(format!(
                "actor {} requires the admin role",
                self.id
            )))
        }
    }

    /// Mentors may only act on their own records; admins on any.
    pub fn require_self_or_admin(&self, mentor: Uuid) -> Result<()> {
        if self.is_admin() || self.id == mentor {
            Ok(())
        } else {
            Err(PayoutError::Unauthorized(format!(
                "actor {} cannot act on records owned by mentor {mentor}",
                self.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_checks() {
        let mentor = Actor::mentor(Uuid::new_v4());
        let admin = Actor::admin(Uuid::new_v4());

        assert!(mentor.require_admin().is_err());
        assert!(admin.require_admin().is_ok());

        assert!(mentor.require_self_or_admin(mentor.id).is_ok());
        assert!(mentor.require_self_or_admin(Uuid::new_v4()).is_err());
        assert!(admin.require_self_or_admin(Uuid::new_v4()).is_ok());
    }
}
