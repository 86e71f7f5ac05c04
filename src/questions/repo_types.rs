use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Set together, exactly once, when a doctor answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub answered_at: OffsetDateTime,
}

/// `pending -> answered`; answered is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QuestionState {
    Pending,
    Answered(Answer),
}

impl QuestionState {
    pub fn is_pending(&self) -> bool {
        matches!(self, QuestionState::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    #[serde(flatten)]
    pub state: QuestionState,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Caller-controlled part of a new question. Id, timestamp and status are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
}

/// Content revision of a pending question.
#[derive(Debug, Clone, Default)]
pub struct QuestionPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl QuestionPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.category.is_none()
    }

    pub(crate) fn apply(&self, q: &mut Question) {
        if let Some(t) = &self.title {
            q.title = t.clone();
        }
        if let Some(d) = &self.description {
            q.description = d.clone();
        }
        if let Some(c) = &self.category {
            q.category = c.clone();
        }
    }
}

/// Flat `questions` table row.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: String,
    pub answer: Option<String>,
    pub doctor_id: Option<Uuid>,
    pub doctor_name: Option<String>,
    pub answered_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl TryFrom<QuestionRow> for Question {
    type Error = anyhow::Error;

    fn try_from(r: QuestionRow) -> Result<Self, Self::Error> {
        let state = match (r.status.as_str(), r.answer, r.doctor_id, r.doctor_name, r.answered_at) {
            ("pending", _, _, _, _) => QuestionState::Pending,
            ("answered", Some(answer), Some(doctor_id), Some(doctor_name), Some(answered_at)) => {
                QuestionState::Answered(Answer {
                    answer,
                    doctor_id,
                    doctor_name,
                    answered_at,
                })
            }
            (status, ..) => anyhow::bail!("question {} has inconsistent status {status}", r.id),
        };
        Ok(Self {
            id: r.id,
            patient_id: r.patient_id,
            patient_name: r.patient_name,
            title: r.title,
            description: r.description,
            category: r.category,
            state,
            created_at: r.created_at,
        })
    }
}
