use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::QuestionRepo;
use super::repo_types::{Answer, NewQuestion, Question, QuestionPatch, QuestionState};
use crate::error::StoreError;

/// Process-local question store. Rows are kept in insertion order so that
/// equal timestamps still list newest first.
#[derive(Default)]
pub struct MemoryQuestionRepo {
    rows: RwLock<Vec<Question>>,
}

impl MemoryQuestionRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(rows: impl DoubleEndedIterator<Item = Question>) -> Vec<Question> {
    let mut out: Vec<Question> = rows.rev().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}

#[async_trait]
impl QuestionRepo for MemoryQuestionRepo {
    async fn insert(&self, new: NewQuestion) -> Result<Question, StoreError> {
        let question = Question {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            patient_name: new.patient_name,
            title: new.title,
            description: new.description,
            category: new.category,
            state: QuestionState::Pending,
            created_at: OffsetDateTime::now_utc(),
        };
        self.rows.write().await.push(question.clone());
        Ok(question)
    }

    async fn update(&self, id: Uuid, patch: QuestionPatch) -> Result<Question, StoreError> {
        let mut rows = self.rows.write().await;
        let q = rows.iter_mut().find(|q| q.id == id).ok_or(StoreError::NotFound)?;
        if !q.state.is_pending() {
            return Err(StoreError::Conflict);
        }
        patch.apply(q);
        Ok(q.clone())
    }

    async fn answer(&self, id: Uuid, answer: Answer) -> Result<Question, StoreError> {
        let mut rows = self.rows.write().await;
        let q = rows.iter_mut().find(|q| q.id == id).ok_or(StoreError::NotFound)?;
        if !q.state.is_pending() {
            return Err(StoreError::Conflict);
        }
        q.state = QuestionState::Answered(answer);
        Ok(q.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Question>, StoreError> {
        Ok(self.rows.read().await.iter().find(|q| q.id == id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Question>, StoreError> {
        Ok(newest_first(self.rows.read().await.iter().cloned()))
    }
}
