// src/services/clone.rs

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::{
        course::{
            Assignment, AssignmentCriterion, AssignmentTree, CriterionFields, Lesson,
            LessonResource, LessonTree, ResourceFields,
        },
        question::QuestionDetail,
        quiz::QuizDetail,
        record::Scope,
    },
    services::{
        ordering,
        ownership::{self, Actor, OwnershipPolicy, Resource},
        repository,
    },
};

/// A subtree that can be deep-copied under a new parent.
///
/// `insert_copy` writes fresh rows only; every row goes through the same
/// validation as an authored one, so a malformed source aborts the copy.
#[async_trait]
pub trait Replicate: Sized + Send + Sync {
    /// Sibling scope the copied root is appended to.
    const SCOPE: Scope;

    fn source(id: i64) -> Resource;
    fn target(parent_id: i64) -> Resource;

    async fn load(conn: &mut SqliteConnection, id: i64) -> Result<Self, AppError>;

    async fn insert_copy(
        &self,
        conn: &mut SqliteConnection,
        parent_id: i64,
        order: i64,
    ) -> Result<i64, AppError>;
}

#[async_trait]
impl Replicate for QuestionDetail {
    const SCOPE: Scope = Scope::QuizQuestions;

    fn source(id: i64) -> Resource {
        Resource::Question(id)
    }

    fn target(parent_id: i64) -> Resource {
        Resource::Quiz(parent_id)
    }

    async fn load(conn: &mut SqliteConnection, id: i64) -> Result<Self, AppError> {
        repository::load_question(conn, id).await
    }

    async fn insert_copy(
        &self,
        conn: &mut SqliteConnection,
        parent_id: i64,
        order: i64,
    ) -> Result<i64, AppError> {
        let (id, _) =
            repository::insert_question(conn, parent_id, order, &self.fields, &self.answer_key)
                .await?;
        Ok(id)
    }
}

#[async_trait]
impl Replicate for QuizDetail {
    const SCOPE: Scope = Scope::SectionQuizzes;

    fn source(id: i64) -> Resource {
        Resource::Quiz(id)
    }

    fn target(parent_id: i64) -> Resource {
        Resource::Section(parent_id)
    }

    async fn load(conn: &mut SqliteConnection, id: i64) -> Result<Self, AppError> {
        repository::load_quiz(conn, id).await
    }

    async fn insert_copy(
        &self,
        conn: &mut SqliteConnection,
        parent_id: i64,
        order: i64,
    ) -> Result<i64, AppError> {
        let quiz_id = repository::insert_record(conn, parent_id, order, &self.quiz.fields).await?;
        for (index, question) in self.questions.iter().enumerate() {
            question.insert_copy(conn, quiz_id, index as i64 + 1).await?;
        }
        Ok(quiz_id)
    }
}

#[async_trait]
impl Replicate for LessonTree {
    const SCOPE: Scope = Scope::SectionLessons;

    fn source(id: i64) -> Resource {
        Resource::Lesson(id)
    }

    fn target(parent_id: i64) -> Resource {
        Resource::Section(parent_id)
    }

    async fn load(conn: &mut SqliteConnection, id: i64) -> Result<Self, AppError> {
        let lesson: Lesson = repository::fetch_row(conn, Scope::SectionLessons, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("lesson {} not found", id)))?;
        let resources = repository::fetch_children(conn, Scope::LessonResources, id).await?;
        Ok(LessonTree { lesson, resources })
    }

    async fn insert_copy(
        &self,
        conn: &mut SqliteConnection,
        parent_id: i64,
        order: i64,
    ) -> Result<i64, AppError> {
        let lesson_id =
            repository::insert_record(conn, parent_id, order, &self.lesson.fields).await?;
        repository::insert_all::<LessonResource, ResourceFields>(conn, lesson_id, &self.resources)
            .await?;
        Ok(lesson_id)
    }
}

#[async_trait]
impl Replicate for AssignmentTree {
    const SCOPE: Scope = Scope::SectionAssignments;

    fn source(id: i64) -> Resource {
        Resource::Assignment(id)
    }

    fn target(parent_id: i64) -> Resource {
        Resource::Section(parent_id)
    }

    async fn load(conn: &mut SqliteConnection, id: i64) -> Result<Self, AppError> {
        let assignment: Assignment = repository::fetch_row(conn, Scope::SectionAssignments, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("assignment {} not found", id)))?;
        let criteria = repository::fetch_children(conn, Scope::AssignmentCriteria, id).await?;
        Ok(AssignmentTree {
            assignment,
            criteria,
        })
    }

    async fn insert_copy(
        &self,
        conn: &mut SqliteConnection,
        parent_id: i64,
        order: i64,
    ) -> Result<i64, AppError> {
        let assignment_id =
            repository::insert_record(conn, parent_id, order, &self.assignment.fields).await?;
        repository::insert_all::<AssignmentCriterion, CriterionFields>(
            conn,
            assignment_id,
            &self.criteria,
        )
        .await?;
        Ok(assignment_id)
    }
}

/// Copies one subtree under `target_parent_id` inside the caller's
/// transaction. Returns the id of the copied root.
pub async fn replicate_in<T: Replicate>(
    conn: &mut SqliteConnection,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    source_id: i64,
    target_parent_id: i64,
) -> Result<i64, AppError> {
    ownership::authorize(policy, conn, actor, T::source(source_id)).await?;
    ownership::authorize(policy, conn, actor, T::target(target_parent_id)).await?;

    let source = T::load(conn, source_id).await?;
    let order = ordering::next_order(conn, target_parent_id, T::SCOPE).await?;
    let new_id = source.insert_copy(conn, target_parent_id, order).await?;

    tracing::info!(
        entity = T::SCOPE.entity(),
        source_id,
        new_id,
        target_parent_id,
        actor = actor.id,
        "subtree cloned"
    );

    Ok(new_id)
}

/// Copies one subtree in its own transaction; nothing is kept on failure.
pub async fn replicate<T: Replicate>(
    pool: &SqlitePool,
    policy: &dyn OwnershipPolicy,
    actor: Actor,
    source_id: i64,
    target_parent_id: i64,
) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;
    let new_id = replicate_in::<T>(&mut *tx, policy, actor, source_id, target_parent_id).await?;
    tx.commit().await?;
    Ok(new_id)
}
