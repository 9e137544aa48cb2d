// src/handlers/course.rs

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
    models::{
        course::{AssignmentTree, LessonTree},
        quiz::{CloneRequest, ReorderRequest},
    },
    services::{authoring, clone, ownership::OwnershipPolicy},
    utils::jwt::Claims,
};

/// Reorders the quizzes of a section.
pub async fn reorder_quizzes(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path(section_id): Path<i64>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(field_errors("", &e)))?;
    let actor = claims.actor()?;

    let ids = authoring::reorder_section_quizzes(
        &pool,
        policy.as_ref(),
        actor,
        section_id,
        &payload.ordered_ids,
    )
    .await?;
    Ok(Json(json!({ "ordered_ids": ids })))
}

pub async fn clone_lesson(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<CloneRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = claims.actor()?;
    let id = clone::replicate::<LessonTree>(
        &pool,
        policy.as_ref(),
        actor,
        lesson_id,
        payload.section_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub async fn clone_assignment(
    State(pool): State<SqlitePool>,
    State(policy): State<Arc<dyn OwnershipPolicy>>,
    Extension(claims): Extension<Claims>,
    Path(assignment_id): Path<i64>,
    Json(payload): Json<CloneRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = claims.actor()?;
    let id = clone::replicate::<AssignmentTree>(
        &pool,
        policy.as_ref(),
        actor,
        assignment_id,
        payload.section_id,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}
