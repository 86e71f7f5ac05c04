use serde::{Deserialize, Serialize};

use super::repo_types::Question;

/// Body of `POST /questions`. Status or answer fields sent by the client
/// are not part of this type and are dropped.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AskRequest {
    pub title: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AnswerRequest {
    pub answer: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuestionEnvelope {
    pub question: Question,
}
