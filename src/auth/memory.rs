use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::claims::Role;
use super::repo::UserRepo;
use super::repo_types::{NewUser, User};
use crate::error::StoreError;

/// Process-local account store for development and tests.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            age: new.age,
            gender: new.gender,
            profile: new.profile,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn update_profile(&self, user: &User) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let stored = users
            .get_mut(&user.id)
            .filter(|u| u.role() == user.role())
            .ok_or(StoreError::NotFound)?;
        stored.name = user.name.clone();
        stored.age = user.age;
        stored.gender = user.gender.clone();
        stored.profile = user.profile.clone();
        Ok(stored.clone())
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        let mut out: Vec<User> = users.values().filter(|u| u.role() == role).cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}
