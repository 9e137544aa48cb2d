// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::models::{
    question::QuestionDef,
    question::QuestionDetail,
    record::{Record, Scope, Value},
};

fn default_passing_grade() -> f64 {
    60.0
}

/// How a quiz is scored; consumed by the grading subsystem.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct ScoringConfig {
    /// Percentage of total points required to pass (0-100).
    #[serde(default = "default_passing_grade")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub passing_grade: f64,
    pub time_limit_minutes: Option<i64>,
    pub max_attempts: Option<i64>,
    #[serde(default)]
    pub randomize_questions: bool,
    #[serde(default)]
    pub randomize_options: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            passing_grade: default_passing_grade(),
            time_limit_minutes: None,
            max_attempts: None,
            randomize_questions: false,
            randomize_options: false,
        }
    }
}

/// Scalar fields of a quiz, shared by the table row and incoming requests.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, Validate)]
pub struct QuizFields {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    #[sqlx(flatten)]
    #[serde(default)]
    pub scoring_config: ScoringConfig,
}

impl Record for QuizFields {
    const SCOPE: Scope = Scope::SectionQuizzes;
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "description",
        "passing_grade",
        "time_limit_minutes",
        "max_attempts",
        "randomize_questions",
        "randomize_options",
    ];

    fn values(&self) -> Vec<Value> {
        let scoring = &self.scoring_config;
        vec![
            Value::Text(self.title.clone()),
            Value::Text(self.description.clone()),
            Value::Real(scoring.passing_grade),
            Value::Int(scoring.time_limit_minutes),
            Value::Int(scoring.max_attempts),
            Value::Bool(scoring.randomize_questions),
            Value::Bool(scoring.randomize_options),
        ]
    }
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct QuizRow {
    pub id: i64,
    pub section_id: i64,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    /// Bumped by every update that writes something.
    pub version: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fields: QuizFields,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A quiz re-loaded with every question and answer key, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: QuizRow,
    pub questions: Vec<QuestionDetail>,
}

/// Body of `POST /quizzes` and `PUT /quizzes/{id}`.
///
/// `questions` is always the complete list: entries omitted here are
/// deleted on update.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizRequest {
    /// Required on create, ignored on update.
    pub section_id: Option<i64>,
    /// When present on update, must equal the stored version.
    pub version: Option<i64>,
    #[serde(flatten)]
    pub fields: QuizFields,
    #[serde(default)]
    pub questions: Vec<QuestionDef>,
}

/// DTO for updating quiz metadata. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
}

/// DTO for direct question field updates. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub text: Option<String>,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub points: Option<f64>,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
    #[validate(length(max = 500))]
    pub image_url: Option<String>,
}

/// Body of the reorder endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct ReorderRequest {
    #[validate(length(min = 1, max = 500))]
    pub ordered_ids: Vec<i64>,
}

/// Body of `POST /quizzes/{id}/questions/import`.
#[derive(Debug, Deserialize, Validate)]
pub struct ImportRequest {
    #[validate(length(min = 1, max = 200))]
    pub question_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub count: usize,
    pub ids: Vec<i64>,
}

/// Body of the clone endpoints: the section receiving the copy.
#[derive(Debug, Deserialize)]
pub struct CloneRequest {
    pub section_id: i64,
}
