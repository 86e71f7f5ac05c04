use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use super::claims::{AuthClaim, Role};
use super::dto::{ProfileAttrs, ProfileUpdateRequest, PublicUser, RegisterRequest, LoginRequest};
use super::password::{hash_password, verify_password};
use super::repo::UserRepo;
use super::repo_types::{NewUser, RoleProfile, User};
use crate::{error::AppError, state::AppState};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `None` leaves a field alone; a blank value clears it.
fn cleaned(v: &Option<String>) -> Option<Option<String>> {
    v.as_ref().map(|s| {
        let t = s.trim();
        (!t.is_empty()).then(|| t.to_string())
    })
}

fn validate_age(age: Option<i32>) -> Result<(), AppError> {
    match age {
        Some(a) if !(0..=150).contains(&a) => Err(AppError::validation("Age must be between 0 and 150")),
        _ => Ok(()),
    }
}

/// Copies the attributes that belong to the profile's role; the rest are dropped.
fn apply_attrs(profile: &mut RoleProfile, attrs: &ProfileAttrs) {
    match profile {
        RoleProfile::Patient(p) => {
            if let Some(v) = cleaned(&attrs.medical_history) {
                p.medical_history = v;
            }
            if let Some(v) = cleaned(&attrs.profile_picture) {
                p.profile_picture = v;
            }
            if attrs.specialization.is_some()
                || attrs.qualifications.is_some()
                || attrs.availability.is_some()
            {
                debug!("ignoring doctor-only attributes for patient");
            }
        }
        RoleProfile::Doctor(d) => {
            if let Some(v) = cleaned(&attrs.specialization) {
                d.specialization = v;
            }
            if let Some(v) = cleaned(&attrs.qualifications) {
                d.qualifications = v;
            }
            if let Some(v) = cleaned(&attrs.availability) {
                d.availability = v;
            }
            if attrs.medical_history.is_some() || attrs.profile_picture.is_some() {
                debug!("ignoring patient-only attributes for doctor");
            }
        }
    }
}

async fn hash_off_thread(plain: &str) -> anyhow::Result<String> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&plain))
        .await
        .context("password hashing task")?
}

async fn verify_off_thread(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let (plain, hash) = (plain.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .context("password verification task")?
}

/// Hashes the plaintext password and persists a new account.
pub async fn create_user(
    users: &dyn UserRepo,
    name: String,
    email: String,
    password: &str,
    role: Role,
    attrs: &ProfileAttrs,
) -> Result<User, AppError> {
    let password_hash = hash_off_thread(password).await?;
    let mut profile = RoleProfile::empty(role);
    apply_attrs(&mut profile, attrs);
    let user = users
        .create(NewUser {
            name,
            email,
            password_hash,
            age: attrs.age,
            gender: cleaned(&attrs.gender).flatten(),
            profile,
        })
        .await?;
    Ok(user)
}

pub async fn register(st: &AppState, req: RegisterRequest) -> Result<PublicUser, AppError> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);

    if name.is_empty() || email.is_empty() || req.password.is_empty() || req.role.trim().is_empty() {
        warn!("registration with missing fields");
        return Err(AppError::validation("All fields are required"));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    let role: Role = req.role.parse().map_err(|_| {
        warn!(role = %req.role, "unknown role");
        AppError::validation("Role must be either 'patient' or 'doctor'")
    })?;
    validate_age(req.attrs.age)?;

    if st.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let user = create_user(st.users.as_ref(), name, email, &req.password, role, &req.attrs)
        .await
        .map_err(|e| {
            if matches!(e, AppError::DuplicateEmail) {
                warn!("email registered concurrently");
            }
            e
        })?;

    info!(user_id = %user.id, role = %role, "user registered");
    Ok(PublicUser::from(user))
}

/// Every identity-revealing failure collapses to `InvalidCredentials`.
pub async fn login(st: &AppState, req: LoginRequest) -> Result<(String, PublicUser), AppError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        warn!("login with missing fields");
        return Err(AppError::validation("Email and password are required"));
    }

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_off_thread(&req.password, &user.password_hash).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    if let Some(hint) = req.role.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if hint.parse::<Role>().ok() != Some(user.role()) {
            warn!(user_id = %user.id, hint = %hint, "login role mismatch");
            return Err(AppError::InvalidCredentials);
        }
    }

    let token = st
        .tokens
        .issue(user.id, user.role())
        .map_err(|e| AppError::Internal(e.into()))?;

    info!(user_id = %user.id, "user logged in");
    Ok((token, PublicUser::from(user)))
}

pub async fn current_user(st: &AppState, claim: &AuthClaim) -> Result<User, AppError> {
    st.users
        .find_by_id(claim.user_id)
        .await?
        .ok_or(AppError::Unauthenticated("Account no longer exists"))
}

/// Changes name, age, gender and the caller's role attributes. Email and
/// role are immutable.
pub async fn update_profile(
    st: &AppState,
    claim: &AuthClaim,
    req: ProfileUpdateRequest,
) -> Result<PublicUser, AppError> {
    let mut user = current_user(st, claim).await?;

    if let Some(name) = req.name.as_deref() {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Name cannot be empty"));
        }
        user.name = name.to_string();
    }
    validate_age(req.attrs.age)?;
    if req.attrs.age.is_some() {
        user.age = req.attrs.age;
    }
    if let Some(gender) = cleaned(&req.attrs.gender) {
        user.gender = gender;
    }
    apply_attrs(&mut user.profile, &req.attrs);

    let updated = st.users.update_profile(&user).await?;
    info!(user_id = %updated.id, "profile updated");
    Ok(PublicUser::from(updated))
}

pub async fn list_doctors(st: &AppState) -> Result<Vec<PublicUser>, AppError> {
    let doctors = st.users.list_by_role(Role::Doctor).await?;
    Ok(doctors.into_iter().map(PublicUser::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_req(name: &str, email: &str, password: &str, role: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            role: role.into(),
            attrs: ProfileAttrs::default(),
        }
    }

    fn login_req(email: &str, password: &str, role: Option<&str>) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
            role: role.map(String::from),
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("patient@test.com"));
        assert!(!is_valid_email("patient@test"));
        assert!(!is_valid_email("no at sign.com"));
    }

    #[tokio::test]
    async fn register_returns_public_user_without_password() {
        let st = AppState::fake();
        let user = register(&st, register_req("John Doe", " John@Test.com ", "password123", "patient"))
            .await
            .unwrap();
        assert_eq!(user.email, "john@test.com");
        assert_eq!(user.profile.role(), Role::Patient);

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("password123"));
    }

    #[tokio::test]
    async fn second_registration_with_same_email_fails() {
        let st = AppState::fake();
        let first = register(&st, register_req("Alice", "alice@test.com", "password123", "patient"))
            .await
            .unwrap();
        let err = register(&st, register_req("Alicia", "ALICE@test.com", "other-pass", "doctor"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));

        let stored = st.users.find_by_email("alice@test.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.name, "Alice");
        assert_eq!(stored.role(), Role::Patient);
    }

    #[tokio::test]
    async fn register_requires_every_field_and_known_role() {
        let st = AppState::fake();
        for req in [
            register_req("", "a@test.com", "pw", "patient"),
            register_req("A", "", "pw", "patient"),
            register_req("A", "a@test.com", "", "patient"),
            register_req("A", "a@test.com", "pw", ""),
            register_req("A", "a@test.com", "pw", "nurse"),
            register_req("A", "not-an-email", "pw", "patient"),
        ] {
            let err = register(&st, req).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
        }
    }

    #[tokio::test]
    async fn register_keeps_only_attributes_of_the_role() {
        let st = AppState::fake();
        let mut req = register_req("Dr. Sarah Johnson", "doctor@test.com", "password123", "doctor");
        req.attrs.specialization = Some("Cardiology".into());
        req.attrs.medical_history = Some("asthma".into());
        let user = register(&st, req).await.unwrap();

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["specialization"], "Cardiology");
        assert!(json.get("medicalHistory").is_none());
    }

    #[tokio::test]
    async fn login_issues_token_for_valid_credentials() {
        let st = AppState::fake();
        let user = register(&st, register_req("John", "john@test.com", "password123", "patient"))
            .await
            .unwrap();

        let (token, public) = login(&st, login_req("john@test.com", "password123", Some("patient")))
            .await
            .unwrap();
        let claim = st.tokens.verify(&token).unwrap();
        assert_eq!(claim.user_id, user.id);
        assert_eq!(claim.role, Role::Patient);
        assert!(!serde_json::to_string(&public).unwrap().contains("password"));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let st = AppState::fake();
        register(&st, register_req("John", "john@test.com", "password123", "patient"))
            .await
            .unwrap();

        let cases = [
            login_req("john@test.com", "wrong-password", None),
            login_req("john@test.com", "password123", Some("doctor")),
            login_req("john@test.com", "password123", Some("admin")),
            login_req("nobody@test.com", "password123", None),
        ];
        for req in cases {
            let err = login(&st, req).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCredentials));
            assert_eq!(err.to_string(), "Invalid credentials");
        }
    }

    #[tokio::test]
    async fn blank_role_hint_is_ignored() {
        let st = AppState::fake();
        register(&st, register_req("Dr. Chen", "chen@test.com", "password123", "doctor"))
            .await
            .unwrap();
        assert!(login(&st, login_req("chen@test.com", "password123", Some(""))).await.is_ok());
    }

    #[tokio::test]
    async fn update_profile_changes_allowed_fields_only() {
        let st = AppState::fake();
        let user = register(&st, register_req("Jane", "jane@test.com", "password123", "patient"))
            .await
            .unwrap();
        let claim = AuthClaim { user_id: user.id, role: Role::Patient };

        let req = ProfileUpdateRequest {
            name: Some("Jane Smith".into()),
            attrs: ProfileAttrs {
                age: Some(34),
                medical_history: Some("Migraines".into()),
                specialization: Some("Neurology".into()),
                ..Default::default()
            },
        };
        let updated = update_profile(&st, &claim, req).await.unwrap();
        let json = serde_json::to_value(&updated).unwrap();
        assert_eq!(json["name"], "Jane Smith");
        assert_eq!(json["email"], "jane@test.com");
        assert_eq!(json["role"], "patient");
        assert_eq!(json["age"], 34);
        assert_eq!(json["medicalHistory"], "Migraines");
        assert!(json.get("specialization").is_none());
    }

    #[tokio::test]
    async fn update_profile_rejects_blank_name_and_bad_age() {
        let st = AppState::fake();
        let user = register(&st, register_req("Jane", "jane@test.com", "password123", "patient"))
            .await
            .unwrap();
        let claim = AuthClaim { user_id: user.id, role: Role::Patient };

        let blank = ProfileUpdateRequest { name: Some("  ".into()), ..Default::default() };
        assert!(matches!(
            update_profile(&st, &claim, blank).await,
            Err(AppError::Validation(_))
        ));

        let old = ProfileUpdateRequest {
            attrs: ProfileAttrs { age: Some(200), ..Default::default() },
            ..Default::default()
        };
        assert!(matches!(
            update_profile(&st, &claim, old).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn doctors_directory_lists_only_doctors() {
        let st = AppState::fake();
        register(&st, register_req("John", "john@test.com", "password123", "patient")).await.unwrap();
        register(&st, register_req("Dr. Chen", "chen@test.com", "password123", "doctor")).await.unwrap();

        let doctors = list_doctors(&st).await.unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0].name, "Dr. Chen");
    }
}
