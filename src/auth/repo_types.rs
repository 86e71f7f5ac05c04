use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::claims::Role;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

/// Role plus the attributes that only make sense for that role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleProfile {
    Patient(PatientProfile),
    Doctor(DoctorProfile),
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        match self {
            RoleProfile::Patient(_) => Role::Patient,
            RoleProfile::Doctor(_) => Role::Doctor,
        }
    }

    pub fn empty(role: Role) -> Self {
        match role {
            Role::Patient => RoleProfile::Patient(PatientProfile::default()),
            Role::Doctor => RoleProfile::Doctor(DoctorProfile::default()),
        }
    }
}

/// Stored account. Not serializable; responses go through `PublicUser`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub profile: RoleProfile,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn role(&self) -> Role {
        self.profile.role()
    }
}

/// Input for account creation; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub profile: RoleProfile,
}

/// Flat `users` table row.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
    pub availability: Option<String>,
    pub medical_history: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let profile = match r.role.parse::<Role>()? {
            Role::Patient => RoleProfile::Patient(PatientProfile {
                medical_history: r.medical_history,
                profile_picture: r.profile_picture,
            }),
            Role::Doctor => RoleProfile::Doctor(DoctorProfile {
                specialization: r.specialization,
                qualifications: r.qualifications,
                availability: r.availability,
            }),
        };
        Ok(Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            age: r.age,
            gender: r.gender,
            profile,
            created_at: r.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            name: "Dr. Sarah Johnson".into(),
            email: "doctor@test.com".into(),
            password_hash: "$argon2id$stub".into(),
            role: role.into(),
            age: Some(45),
            gender: None,
            specialization: Some("Cardiology".into()),
            qualifications: Some("MD, PhD in Cardiology".into()),
            availability: None,
            medical_history: Some("stale column".into()),
            profile_picture: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn doctor_row_only_exposes_doctor_fields() {
        let user = User::try_from(row("doctor")).unwrap();
        assert_eq!(user.role(), Role::Doctor);
        match user.profile {
            RoleProfile::Doctor(d) => assert_eq!(d.specialization.as_deref(), Some("Cardiology")),
            RoleProfile::Patient(_) => panic!("expected doctor profile"),
        }
    }

    #[test]
    fn unknown_role_in_row_is_an_error() {
        assert!(User::try_from(row("admin")).is_err());
    }
}
