use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{RoleProfile, User};

/// Request body for user registration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(flatten)]
    pub attrs: ProfileAttrs,
}

/// Optional profile attributes; role-specific ones are applied only to the
/// matching role.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileAttrs {
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub medical_history: Option<String>,
    pub profile_picture: Option<String>,
    pub specialization: Option<String>,
    pub qualifications: Option<String>,
    pub availability: Option<String>,
}

/// Request body for login. `role` is an optional hint that must match.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

/// Request body for `PATCH /me`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    #[serde(flatten)]
    pub attrs: ProfileAttrs,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: PublicUser,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: PublicUser,
}

/// Public part of the user returned to the client. Has no password field.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub profile: RoleProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            profile: u.profile,
            age: u.age,
            gender: u.gender,
            created_at: u.created_at,
        }
    }
}
