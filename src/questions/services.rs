use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{AnswerRequest, AskRequest, ReviseRequest};
use super::repo_types::{Answer, NewQuestion, Question, QuestionPatch};
use crate::{
    auth::{
        claims::{AuthClaim, Role},
        services::current_user,
    },
    error::{AppError, StoreError},
    state::AppState,
};

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(v.to_string())
}

fn lifecycle_error(e: StoreError) -> AppError {
    match e {
        StoreError::NotFound => AppError::NotFound("Question"),
        StoreError::Conflict => AppError::AlreadyAnswered,
        other => other.into(),
    }
}

/// A patient opens a new question; it starts out pending.
pub async fn ask(st: &AppState, claim: &AuthClaim, req: AskRequest) -> Result<Question, AppError> {
    if claim.role != Role::Patient {
        warn!(user_id = %claim.user_id, "non-patient tried to ask a question");
        return Err(AppError::Forbidden("Only patients can ask questions"));
    }
    let title = required("title", &req.title)?;
    let description = required("description", &req.description)?;
    let category = required("category", &req.category)?;

    let patient = current_user(st, claim).await?;
    let question = st
        .questions
        .insert(NewQuestion {
            patient_id: patient.id,
            patient_name: patient.name,
            title,
            description,
            category,
        })
        .await?;

    info!(question_id = %question.id, patient_id = %question.patient_id, "question asked");
    Ok(question)
}

/// A doctor answers a pending question. Exactly one answer can win.
pub async fn answer(
    st: &AppState,
    claim: &AuthClaim,
    question_id: Uuid,
    req: AnswerRequest,
) -> Result<Question, AppError> {
    if claim.role != Role::Doctor {
        warn!(user_id = %claim.user_id, "non-doctor tried to answer");
        return Err(AppError::Forbidden("Only doctors can answer questions"));
    }
    let text = required("answer", &req.answer)?;
    let doctor = current_user(st, claim).await?;

    let question = st
        .questions
        .answer(
            question_id,
            Answer {
                answer: text,
                doctor_id: doctor.id,
                doctor_name: doctor.name,
                answered_at: OffsetDateTime::now_utc(),
            },
        )
        .await
        .map_err(|e| {
            if matches!(e, StoreError::Conflict) {
                warn!(%question_id, doctor_id = %claim.user_id, "question already answered");
            }
            lifecycle_error(e)
        })?;

    info!(%question_id, doctor_id = %claim.user_id, "question answered");
    Ok(question)
}

/// Patients see their own questions; doctors see the shared pending inbox.
pub async fn list_mine(st: &AppState, claim: &AuthClaim) -> Result<Vec<Question>, AppError> {
    let questions = match claim.role {
        Role::Patient => st.questions.list_by_patient(claim.user_id).await?,
        Role::Doctor => st.questions.list_pending().await?,
    };
    Ok(questions)
}

pub async fn view(st: &AppState, claim: &AuthClaim, question_id: Uuid) -> Result<Question, AppError> {
    let question = st
        .questions
        .find_by_id(question_id)
        .await?
        .ok_or(AppError::NotFound("Question"))?;
    if claim.role == Role::Patient && question.patient_id != claim.user_id {
        return Err(AppError::Forbidden("You can only view your own questions"));
    }
    Ok(question)
}

/// The asking patient may reword a question while it is still pending.
pub async fn revise(
    st: &AppState,
    claim: &AuthClaim,
    question_id: Uuid,
    req: ReviseRequest,
) -> Result<Question, AppError> {
    if claim.role != Role::Patient {
        return Err(AppError::Forbidden("Only the asking patient can edit a question"));
    }
    let patch = QuestionPatch {
        title: req.title.as_deref().map(|v| required("title", v)).transpose()?,
        description: req
            .description
            .as_deref()
            .map(|v| required("description", v))
            .transpose()?,
        category: req.category.as_deref().map(|v| required("category", v)).transpose()?,
    };
    if patch.is_empty() {
        return Err(AppError::validation("Nothing to update"));
    }

    let existing = view(st, claim, question_id).await?;
    let question = st
        .questions
        .update(existing.id, patch)
        .await
        .map_err(lifecycle_error)?;

    info!(%question_id, "question revised");
    Ok(question)
}
