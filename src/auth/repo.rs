use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::claims::Role;
use super::repo_types::{NewUser, RoleProfile, User, UserRow};
use crate::error::StoreError;

/// Persistence boundary for accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with `StoreError::DuplicateEmail` when the email is taken.
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Persists name, age, gender and role attributes. Email, role and
    /// password hash are left untouched.
    async fn update_profile(&self, user: &User) -> Result<User, StoreError>;
    /// Ordered by name.
    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, StoreError>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, age, gender, \
     specialization, qualifications, availability, medical_history, profile_picture, created_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

struct ProfileColumns<'a> {
    specialization: Option<&'a str>,
    qualifications: Option<&'a str>,
    availability: Option<&'a str>,
    medical_history: Option<&'a str>,
    profile_picture: Option<&'a str>,
}

impl<'a> From<&'a RoleProfile> for ProfileColumns<'a> {
    fn from(p: &'a RoleProfile) -> Self {
        match p {
            RoleProfile::Patient(p) => Self {
                specialization: None,
                qualifications: None,
                availability: None,
                medical_history: p.medical_history.as_deref(),
                profile_picture: p.profile_picture.as_deref(),
            },
            RoleProfile::Doctor(d) => Self {
                specialization: d.specialization.as_deref(),
                qualifications: d.qualifications.as_deref(),
                availability: d.availability.as_deref(),
                medical_history: None,
                profile_picture: None,
            },
        }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let cols = ProfileColumns::from(&new.profile);
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, age, gender,
                               specialization, qualifications, availability,
                               medical_history, profile_picture)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.profile.role().as_str())
        .bind(new.age)
        .bind(new.gender.as_deref())
        .bind(cols.specialization)
        .bind(cols.qualifications)
        .bind(cols.availability)
        .bind(cols.medical_history)
        .bind(cols.profile_picture)
        .fetch_one(&self.db)
        .await?;
        Ok(User::try_from(row)?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn update_profile(&self, user: &User) -> Result<User, StoreError> {
        let cols = ProfileColumns::from(&user.profile);
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET name = $2, age = $3, gender = $4,
                   specialization = $5, qualifications = $6, availability = $7,
                   medical_history = $8, profile_picture = $9
             WHERE id = $1 AND role = $10
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(user.age)
        .bind(user.gender.as_deref())
        .bind(cols.specialization)
        .bind(cols.qualifications)
        .bind(cols.availability)
        .bind(cols.medical_history)
        .bind(cols.profile_picture)
        .bind(user.role().as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(User::try_from(row)?)
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY name ASC"
        ))
        .bind(role.as_str())
        .fetch_all(&self.db)
        .await?;
        rows.into_iter()
            .map(|r| User::try_from(r).map_err(StoreError::from))
            .collect()
    }
}
