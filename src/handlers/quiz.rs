// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::{AppError, field_errors},
    models::quiz::{
        CloneRequest, ImportRequest, ImportResponse, QuizDetail, QuizRequest, ReorderRequest,
        UpdateQuestionRequest, UpdateQuizRequest,
    },
    services::{authoring, clone, ownership::OwnershipPolicy},
    utils::jwt::Claims,
};

/// Creates a quiz with its complete question tree.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<QuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = claims.actor()?;
    let quiz = authoring::create_quiz(&pool, policy.as_ref(), actor, payload).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let actor = claims.actor()?;
    let quiz = authoring::get_quiz(&pool, policy.as_ref(), actor, quiz_id).await?;
    Ok(Json(quiz))
}

/// Full update: the body carries every question the quiz should keep.
pub async fn update_quiz(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<QuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = claims.actor()?;
    let (quiz, _report) =
        authoring::update_quiz(&pool, policy.as_ref(), actor, quiz_id, payload).await?;
    Ok(Json(quiz))
}

/// Updates title and/or description.
pub async fn patch_quiz(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = claims.actor()?;
    let quiz = authoring::patch_quiz(&pool, policy.as_ref(), actor, quiz_id, payload).await?;
    Ok(Json(quiz))
}

pub async fn delete_quiz(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let actor = claims.actor()?;
    authoring::delete_quiz(&pool, policy.as_ref(), actor, quiz_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Copies questions (e.g. picked from a question library) into the quiz.
pub async fn import_questions(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<ImportRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(field_errors("", &e)))?;
    let actor = claims.actor()?;

    let ids =
        authoring::import_questions(&pool, policy.as_ref(), actor, quiz_id, &payload.question_ids)
            .await?;

    Ok(Json(ImportResponse {
        count: ids.len(),
        ids,
    }))
}

/// Deep-copies the quiz into another section.
pub async fn clone_quiz(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CloneRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = claims.actor()?;
    let id = clone::replicate::<QuizDetail>(
        &pool,
        policy.as_ref(),
        actor,
        quiz_id,
        payload.section_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn reorder_questions(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(field_errors("", &e)))?;
    let actor = claims.actor()?;

    let quiz = authoring::reorder_questions(
        &pool,
        policy.as_ref(),
        actor,
        quiz_id,
        &payload.ordered_ids,
    )
    .await?;
    Ok(Json(quiz))
}

/// Reorders the options (or pairs, keywords, gaps) of one question.
pub async fn reorder_options(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path((quiz_id, question_id)): Path<(i64, i64)>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(field_errors("", &e)))?;
    let actor = claims.actor()?;

    let quiz = authoring::reorder_answer_key(
        &pool,
        policy.as_ref(),
        actor,
        quiz_id,
        question_id,
        &payload.ordered_ids,
    )
    .await?;
    Ok(Json(quiz))
}

pub async fn patch_question(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path((quiz_id, question_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = claims.actor()?;
    let question = authoring::patch_question(
        &pool,
        policy.as_ref(),
        actor,
        quiz_id,
        question_id,
        payload,
    )
    .await?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path((quiz_id, question_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let actor = claims.actor()?;
    authoring::delete_question(&pool, policy.as_ref(), actor, quiz_id, question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
