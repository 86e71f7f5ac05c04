use crate::auth::{
    jwt::{JwtKeys, TokenService},
    memory::MemoryUserRepo,
    repo::{PgUserRepo, UserRepo},
};
use crate::config::AppConfig;
use crate::db;
use crate::questions::{
    memory::MemoryQuestionRepo,
    repo::{PgQuestionRepo, QuestionRepo},
};
use axum::extract::FromRef;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub questions: Arc<dyn QuestionRepo>,
    pub tokens: Arc<dyn TokenService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let tokens = Arc::new(JwtKeys::new(&config.jwt)) as Arc<dyn TokenService>;

        let state = match config.database_url.as_deref() {
            Some(url) => {
                let pool = db::connect(url, &config).await?;
                Self::from_parts(
                    config.clone(),
                    Arc::new(PgUserRepo::new(pool.clone())),
                    Arc::new(PgQuestionRepo::new(pool)),
                    tokens,
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory stores, data will not persist");
                Self::in_memory(config.clone(), tokens)
            }
        };
        Ok(state)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        questions: Arc<dyn QuestionRepo>,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        Self {
            config,
            users,
            questions,
            tokens,
        }
    }

    pub fn in_memory(config: Arc<AppConfig>, tokens: Arc<dyn TokenService>) -> Self {
        Self::from_parts(
            config,
            Arc::new(MemoryUserRepo::new()),
            Arc::new(MemoryQuestionRepo::new()),
            tokens,
        )
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database_url: None,
            db_max_connections: 1,
            request_timeout_secs: 5,
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: Vec::new(),
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
            },
        });
        let tokens = Arc::new(JwtKeys::new(&config.jwt)) as Arc<dyn TokenService>;
        Self::in_memory(config, tokens)
    }
}

impl FromRef<AppState> for Arc<dyn TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}
