// src/services/authoring.rs

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::{AppError, field_errors},
    models::{
        question::{AnswerKey, GapFields, QuestionDetail, QuestionKind},
        quiz::{QuizDetail, QuizRequest, UpdateQuestionRequest, UpdateQuizRequest},
        record::Scope,
    },
    services::{
        clone, contract, ordering,
        ownership::{self, Actor, OwnershipPolicy, Resource},
        reconcile::{self, ReconcileReport},
        repository,
    },
    utils::html::clean_html,
};

async fn reload(pool: &SqlitePool, quiz_id: i64) -> Result<QuizDetail, AppError> {
    let mut conn = pool.acquire().await?;
    repository::load_quiz(&mut conn, quiz_id).await
}

/// Fails unless `question_id` is a question of `quiz_id`.
async fn ensure_question_of(
    conn: &mut sqlx::SqliteConnection,
    quiz_id: i64,
    question_id: i64,
) -> Result<(), AppError> {
    match repository::parent_of(conn, Scope::QuizQuestions, question_id).await? {
        Some(owner) if owner == quiz_id => Ok(()),
        Some(_) => Err(AppError::Integrity(format!(
            "question {} belongs to another quiz",
            question_id
        ))),
        None => Err(AppError::NotFound(format!(
            "question {} not found",
            question_id
        ))),
    }
}

pub async fn get_quiz(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    quiz_id: i64,
) -> Result<QuizDetail, AppError> {
    let mut conn = pool.acquire().await?;
    ownership::authorize(policy, &mut conn, actor, Resource::Quiz(quiz_id)).await?;
    repository::load_quiz(&mut conn, quiz_id).await
}

/// Creates a quiz with its full question tree, appended to its section.
pub async fn create_quiz(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    mut req: QuizRequest,
) -> Result<QuizDetail, AppError> {
    let section_id = req
        .section_id
        .ok_or_else(|| AppError::invalid("section_id", "required", "section_id is required"))?;

    let mut tx = pool.begin().await?;
    ownership::authorize(policy, &mut *tx, actor, Resource::Section(section_id)).await?;
    contract::prepare(&mut req)?;

    let order = ordering::next_order(&mut *tx, section_id, Scope::SectionQuizzes).await?;
    let quiz_id = repository::insert_record(&mut *tx, section_id, order, &req.fields).await?;
    let (questions, answer_keys) =
        reconcile::reconcile_questions(&mut *tx, quiz_id, &[], &req.questions).await?;

    tx.commit().await?;

    tracing::info!(
        quiz_id,
        section_id,
        actor = actor.id,
        questions = questions.created,
        answer_rows = answer_keys.created,
        "quiz created"
    );

    reload(pool, quiz_id).await
}

/// Replaces a quiz's fields and question tree with the submitted one.
pub async fn update_quiz(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    quiz_id: i64,
    mut req: QuizRequest,
) -> Result<(QuizDetail, ReconcileReport), AppError> {
    let mut tx = pool.begin().await?;
    ownership::authorize(policy, &mut *tx, actor, Resource::Quiz(quiz_id)).await?;
    contract::prepare(&mut req)?;

    let current = repository::load_quiz(&mut *tx, quiz_id).await?;
    if let Some(expected) = req.version {
        if expected != current.quiz.version {
            return Err(AppError::Conflict(format!(
                "quiz {} is at version {}, not {}",
                quiz_id, current.quiz.version, expected
            )));
        }
    }

    let (questions, answer_keys) =
        reconcile::reconcile_questions(&mut *tx, quiz_id, &current.questions, &req.questions)
            .await?;

    let quiz_updated = current.quiz.fields != req.fields;
    if quiz_updated {
        repository::update_record(&mut *tx, quiz_id, current.quiz.order, &req.fields).await?;
    }

    let report = ReconcileReport {
        quiz_updated,
        questions,
        answer_keys,
    };
    if !report.is_noop() {
        repository::touch_quiz(&mut *tx, quiz_id).await?;
    }

    tx.commit().await?;

    tracing::info!(quiz_id, actor = actor.id, ?report, "quiz reconciled");

    Ok((reload(pool, quiz_id).await?, report))
}

/// Updates quiz metadata only.
pub async fn patch_quiz(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    quiz_id: i64,
    payload: UpdateQuizRequest,
) -> Result<QuizDetail, AppError> {
    let mut tx = pool.begin().await?;
    ownership::authorize(policy, &mut *tx, actor, Resource::Quiz(quiz_id)).await?;

    payload
        .validate()
        .map_err(|e| AppError::Validation(field_errors("", &e)))?;
    if payload.title.is_none() && payload.description.is_none() {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(quiz_id);

    builder.build().execute(&mut *tx).await.map_err(|e| {
        tracing::error!("Failed to update quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;
    repository::touch_quiz(&mut *tx, quiz_id).await?;

    tx.commit().await?;

    reload(pool, quiz_id).await
}

pub async fn delete_quiz(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    quiz_id: i64,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    ownership::authorize(policy, &mut *tx, actor, Resource::Quiz(quiz_id)).await?;

    let section_id = repository::parent_of(&mut *tx, Scope::SectionQuizzes, quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("quiz {} not found", quiz_id)))?;

    repository::delete_quiz(&mut *tx, quiz_id).await?;
    ordering::restamp(&mut *tx, section_id, Scope::SectionQuizzes).await?;

    tx.commit().await?;

    tracing::info!(quiz_id, section_id, actor = actor.id, "quiz deleted");
    Ok(())
}

/// Updates scalar fields of one question without touching its answer key.
pub async fn patch_question(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    quiz_id: i64,
    question_id: i64,
    payload: UpdateQuestionRequest,
) -> Result<QuestionDetail, AppError> {
    let mut tx = pool.begin().await?;
    ownership::authorize(policy, &mut *tx, actor, Resource::Quiz(quiz_id)).await?;
    ensure_question_of(&mut *tx, quiz_id, question_id).await?;

    payload
        .validate()
        .map_err(|e| AppError::Validation(field_errors("", &e)))?;
    if let Some(url) = payload.image_url.as_deref().filter(|url| !url.is_empty()) {
        if url::Url::parse(url).is_err() {
            return Err(AppError::invalid("image_url", "url", "must be an absolute URL"));
        }
    }
    if payload.text.is_none()
        && payload.points.is_none()
        && payload.explanation.is_none()
        && payload.image_url.is_none()
    {
        return Err(AppError::BadRequest("No fields to update".to_string()));
    }

    let text = payload.text.as_deref().map(clean_html);
    if let Some(text) = text.as_deref() {
        let current = repository::load_question(&mut *tx, question_id).await?;
        if let AnswerKey::FillGap { gaps } = &current.answer_key {
            let answers: Vec<GapFields> = gaps.iter().map(|gap| gap.fields.clone()).collect();
            contract::check_gap_text(text, &answers)?;
        }
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(text) = text {
        separated.push("text = ");
        separated.push_bind_unseparated(text);
    }

    if let Some(points) = payload.points {
        separated.push("points = ");
        separated.push_bind_unseparated(points);
    }

    // An empty string clears the column.
    if let Some(explanation) = payload.explanation {
        separated.push("explanation = ");
        separated.push_bind_unseparated(
            (!explanation.is_empty()).then(|| clean_html(&explanation)),
        );
    }

    if let Some(image_url) = payload.image_url {
        separated.push("image_url = ");
        separated.push_bind_unseparated((!image_url.is_empty()).then_some(image_url));
    }

    builder.push(" WHERE id = ");
    builder.push_bind(question_id);

    builder.build().execute(&mut *tx).await.map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;
    repository::touch_quiz(&mut *tx, quiz_id).await?;

    let question = repository::load_question(&mut *tx, question_id).await?;
    tx.commit().await?;

    Ok(question)
}

/// Deletes one question and closes the gap it leaves in the quiz order.
pub async fn delete_question(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    quiz_id: i64,
    question_id: i64,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    ownership::authorize(policy, &mut *tx, actor, Resource::Quiz(quiz_id)).await?;
    ensure_question_of(&mut *tx, quiz_id, question_id).await?;

    repository::delete_question(&mut *tx, question_id).await?;
    ordering::restamp(&mut *tx, quiz_id, Scope::QuizQuestions).await?;
    repository::touch_quiz(&mut *tx, quiz_id).await?;

    tx.commit().await?;

    tracing::info!(quiz_id, question_id, actor = actor.id, "question deleted");
    Ok(())
}

/// Copies library questions into a quiz, all or nothing.
pub async fn import_questions(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    quiz_id: i64,
    question_ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    let mut tx = pool.begin().await?;

    let mut ids = Vec::with_capacity(question_ids.len());
    for source_id in question_ids {
        let new_id =
            clone::replicate_in::<QuestionDetail>(&mut *tx, policy, actor, *source_id, quiz_id)
                .await?;
        ids.push(new_id);
    }
    if !ids.is_empty() {
        repository::touch_quiz(&mut *tx, quiz_id).await?;
    }

    tx.commit().await?;

    tracing::info!(quiz_id, actor = actor.id, count = ids.len(), "questions imported");
    Ok(ids)
}

pub async fn reorder_questions(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    quiz_id: i64,
    ordered_ids: &[i64],
) -> Result<QuizDetail, AppError> {
    let mut tx = pool.begin().await?;
    ownership::authorize(policy, &mut *tx, actor, Resource::Quiz(quiz_id)).await?;

    ordering::reassign(&mut *tx, quiz_id, Scope::QuizQuestions, ordered_ids).await?;

    tx.commit().await?;
    reload(pool, quiz_id).await
}

/// Reorders the answer-key rows of one question, whatever its kind.
pub async fn reorder_answer_key(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    quiz_id: i64,
    question_id: i64,
    ordered_ids: &[i64],
) -> Result<QuizDetail, AppError> {
    let mut tx = pool.begin().await?;
    ownership::authorize(policy, &mut *tx, actor, Resource::Quiz(quiz_id)).await?;
    ensure_question_of(&mut *tx, quiz_id, question_id).await?;

    let kind: String = sqlx::query_scalar("SELECT kind FROM questions WHERE id = ?")
        .bind(question_id)
        .fetch_one(&mut *tx)
        .await?;
    let kind = kind
        .parse::<QuestionKind>()
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    ordering::reassign(&mut *tx, question_id, kind.answer_scope(), ordered_ids).await?;

    tx.commit().await?;
    reload(pool, quiz_id).await
}

pub async fn reorder_section_quizzes(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    section_id: i64,
    ordered_ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    let mut tx = pool.begin().await?;
    ownership::authorize(policy, &mut *tx, actor, Resource::Section(section_id)).await?;

    ordering::reassign(&mut *tx, section_id, Scope::SectionQuizzes, ordered_ids).await?;
    let ids = ordering::ordered_ids(&mut *tx, section_id, Scope::SectionQuizzes).await?;

    tx.commit().await?;
    Ok(ids)
}
