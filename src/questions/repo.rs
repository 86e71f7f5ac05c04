use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Answer, NewQuestion, Question, QuestionPatch, QuestionRow};
use crate::error::StoreError;

/// Persistence boundary for questions. Listings are newest first.
#[async_trait]
pub trait QuestionRepo: Send + Sync {
    /// Assigns id and `created_at`; the stored question is always pending.
    async fn insert(&self, new: NewQuestion) -> Result<Question, StoreError>;

    /// Revises content of a pending question. `NotFound` if absent,
    /// `Conflict` if already answered.
    async fn update(&self, id: Uuid, patch: QuestionPatch) -> Result<Question, StoreError>;

    /// Atomic `pending -> answered`. `NotFound` if absent, `Conflict` if
    /// another answer won.
    async fn answer(&self, id: Uuid, answer: Answer) -> Result<Question, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Question>, StoreError>;

    async fn list_all(&self) -> Result<Vec<Question>, StoreError>;

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Question>, StoreError> {
        let all = self.list_all().await?;
        Ok(all.into_iter().filter(|q| q.patient_id == patient_id).collect())
    }

    async fn list_pending(&self) -> Result<Vec<Question>, StoreError> {
        let all = self.list_all().await?;
        Ok(all.into_iter().filter(|q| q.state.is_pending()).collect())
    }
}

const QUESTION_COLUMNS: &str = "id, patient_id, patient_name, title, description, category, \
     status, answer, doctor_id, doctor_name, answered_at, created_at";

#[derive(Clone)]
pub struct PgQuestionRepo {
    db: PgPool,
}

impl PgQuestionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM questions WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await
            .context("check question exists")?;
        Ok(exists)
    }

    /// Resolves a conditional update that matched no row.
    async fn miss(&self, id: Uuid) -> StoreError {
        match self.exists(id).await {
            Ok(true) => StoreError::Conflict,
            Ok(false) => StoreError::NotFound,
            Err(e) => e,
        }
    }

    async fn fetch_many(&self, sql: &str, bind: Option<Uuid>) -> Result<Vec<Question>, StoreError> {
        let mut query = sqlx::query_as::<_, QuestionRow>(sql);
        if let Some(id) = bind {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.db).await?;
        rows.into_iter()
            .map(|r| Question::try_from(r).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl QuestionRepo for PgQuestionRepo {
    async fn insert(&self, new: NewQuestion) -> Result<Question, StoreError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            INSERT INTO questions (id, patient_id, patient_name, title, description, category, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending')
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.patient_id)
        .bind(&new.patient_name)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.category)
        .fetch_one(&self.db)
        .await?;
        Ok(Question::try_from(row)?)
    }

    async fn update(&self, id: Uuid, patch: QuestionPatch) -> Result<Question, StoreError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            UPDATE questions
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   category = COALESCE($4, category)
             WHERE id = $1 AND status = 'pending'
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.category.as_deref())
        .fetch_optional(&self.db)
        .await?;
        match row {
            Some(r) => Ok(Question::try_from(r)?),
            None => Err(self.miss(id).await),
        }
    }

    async fn answer(&self, id: Uuid, answer: Answer) -> Result<Question, StoreError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            UPDATE questions
               SET status = 'answered', answer = $2, doctor_id = $3,
                   doctor_name = $4, answered_at = $5
             WHERE id = $1 AND status = 'pending'
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&answer.answer)
        .bind(answer.doctor_id)
        .bind(&answer.doctor_name)
        .bind(answer.answered_at)
        .fetch_optional(&self.db)
        .await?;
        match row {
            Some(r) => Ok(Question::try_from(r)?),
            None => Err(self.miss(id).await),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Question>, StoreError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Question::try_from).transpose()?)
    }

    async fn list_all(&self) -> Result<Vec<Question>, StoreError> {
        self.fetch_many(
            &format!("SELECT {QUESTION_COLUMNS} FROM questions ORDER BY created_at DESC"),
            None,
        )
        .await
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Question>, StoreError> {
        self.fetch_many(
            &format!(
                "SELECT {QUESTION_COLUMNS} FROM questions WHERE patient_id = $1 ORDER BY created_at DESC"
            ),
            Some(patient_id),
        )
        .await
    }

    async fn list_pending(&self) -> Result<Vec<Question>, StoreError> {
        self.fetch_many(
            &format!(
                "SELECT {QUESTION_COLUMNS} FROM questions WHERE status = 'pending' ORDER BY created_at DESC"
            ),
            None,
        )
        .await
    }
}
