use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, CoreResult};

/// Actor role resolved once per request by the identity resolver and
/// passed explicitly into every component operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Customer,
    TravelAgency,
    Admin,
}

impl Role {
    /// Maps the free-form role claim carried by legacy tokens onto the
    /// typed role. Unknown values degrade to Customer, never to a
    /// privileged role.
    pub fn from_claim(raw: &str) -> Role {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADMIN" | "EMPLEADO" => Role::Admin,
            "TRAVEL_AGENCY" | "AGENCY" | "WEBSERVICE" => Role::TravelAgency,
            _ => Role::Customer,
        }
    }
}

/// Resolved identity for the current request. Produced by the identity
/// resolver, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub subject_id: Uuid,
    pub role: Role,
    pub display_name: String,
    pub email: String,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> CoreResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CoreError::Forbidden(
                "requiere rol administrador/empleado".to_string(),
            ))
        }
    }

    /// Agencies and admins may read reservations they do not own.
    pub fn can_read_any_reservation(&self) -> bool {
        matches!(self.role, Role::Admin | Role::TravelAgency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_role_claim_degrades_to_customer() {
        assert_eq!(Role::from_claim("SUPER_USER"), Role::Customer);
        assert_eq!(Role::from_claim(""), Role::Customer);
    }

    #[test]
    fn role_claims_map_to_typed_roles() {
        assert_eq!(Role::from_claim("admin"), Role::Admin);
        assert_eq!(Role::from_claim(" webservice "), Role::TravelAgency);
        assert_eq!(Role::from_claim("CUSTOMER"), Role::Customer);
    }

    #[test]
    fn require_admin_rejects_other_roles() {
        let p = Principal {
            subject_id: Uuid::new_v4(),
            role: Role::TravelAgency,
            display_name: "Agencia".to_string(),
            email: "ws@example.com".to_string(),
        };
        assert!(matches!(p.require_admin(), Err(CoreError::Forbidden(_))));
    }
}
