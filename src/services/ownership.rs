// src/services/ownership.rs

use async_trait::async_trait;
use sqlx::SqliteConnection;

use crate::error::AppError;

/// The authenticated user performing an authoring operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
}

/// Anything whose ultimate owner is a course owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Section(i64),
    Quiz(i64),
    Question(i64),
    Lesson(i64),
    Assignment(i64),
}

impl Resource {
    fn describe(self) -> (&'static str, i64) {
        match self {
            Resource::Section(id) => ("section", id),
            Resource::Quiz(id) => ("quiz", id),
            Resource::Question(id) => ("question", id),
            Resource::Lesson(id) => ("lesson", id),
            Resource::Assignment(id) => ("assignment", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied,
    Missing,
}

/// Decides whether an actor may author a resource.
#[async_trait]
pub trait OwnershipPolicy: Send + Sync {
    async fn check(
        &self,
        conn: &mut SqliteConnection,
        actor: Actor,
        resource: Resource,
    ) -> Result<Access, AppError>;
}

/// Grants access to the owner of the course a resource hangs off.
#[derive(Debug, Clone, Copy, Default)]
pub struct CourseOwnership;

#[async_trait]
impl OwnershipPolicy for CourseOwnership {
    async fn check(
        &self,
        conn: &mut SqliteConnection,
        actor: Actor,
        resource: Resource,
    ) -> Result<Access, AppError> {
        let owner = owner_of(conn, resource).await?;
        Ok(match owner {
            None => Access::Missing,
            Some(owner_id) if owner_id == actor.id => Access::Granted,
            Some(_) => Access::Denied,
        })
    }
}

async fn owner_of(
    conn: &mut SqliteConnection,
    resource: Resource,
) -> Result<Option<i64>, AppError> {
    let sql = match resource {
        Resource::Section(_) => {
            "SELECT c.owner_id FROM sections s
             JOIN courses c ON c.id = s.course_id
             WHERE s.id = ?"
        }
        Resource::Quiz(_) => {
            "SELECT c.owner_id FROM quizzes z
             JOIN sections s ON s.id = z.section_id
             JOIN courses c ON c.id = s.course_id
             WHERE z.id = ?"
        }
        Resource::Question(_) => {
            "SELECT c.owner_id FROM questions q
             JOIN quizzes z ON z.id = q.quiz_id
             JOIN sections s ON s.id = z.section_id
             JOIN courses c ON c.id = s.course_id
             WHERE q.id = ?"
        }
        Resource::Lesson(_) => {
            "SELECT c.owner_id FROM lessons l
             JOIN sections s ON s.id = l.section_id
             JOIN courses c ON c.id = s.course_id
             WHERE l.id = ?"
        }
        Resource::Assignment(_) => {
            "SELECT c.owner_id FROM assignments a
             JOIN sections s ON s.id = a.section_id
             JOIN courses c ON c.id = s.course_id
             WHERE a.id = ?"
        }
    };
    let (_, id) = resource.describe();

    let owner: Option<i64> = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(owner)
}

/// Fails with `NotFound` or `Forbidden` unless the policy grants access.
pub async fn authorize(
    policy: &dyn OwnershipPolicy,
    conn: &mut SqliteConnection,
    actor: Actor,
    resource: Resource,
) -> Result<(), AppError> {
    let (entity, id) = resource.describe();
    match policy.check(conn, actor, resource).await? {
        Access::Granted => Ok(()),
        Access::Denied => {
            tracing::warn!(actor = actor.id, ?resource, "ownership check denied");
            Err(AppError::Forbidden(format!(
                "You do not own {} {}",
                entity, id
            )))
        }
        Access::Missing => Err(AppError::NotFound(format!("{} {} not found", entity, id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn course_owner_resolves_through_the_section_chain() {
        let pool = db::connect_in_memory().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        for sql in [
            "INSERT INTO courses (id, owner_id, title) VALUES (1, 7, 'C')",
            "INSERT INTO sections (id, course_id, title) VALUES (2, 1, 'S')",
            "INSERT INTO quizzes (id, section_id, sort_order, title) VALUES (3, 2, 1, 'Q')",
            "INSERT INTO questions (id, quiz_id, sort_order, kind, text) VALUES (4, 3, 1, 'keywords', 'T')",
        ] {
            sqlx::query(sql).execute(&mut *conn).await.unwrap();
        }

        let owner = Actor { id: 7 };
        let stranger = Actor { id: 8 };
        let policy = CourseOwnership;

        assert_eq!(
            policy.check(&mut conn, owner, Resource::Question(4)).await.unwrap(),
            Access::Granted
        );
        assert_eq!(
            policy.check(&mut conn, stranger, Resource::Quiz(3)).await.unwrap(),
            Access::Denied
        );
        assert_eq!(
            policy.check(&mut conn, owner, Resource::Lesson(99)).await.unwrap(),
            Access::Missing
        );

        let denied = authorize(&policy, &mut conn, stranger, Resource::Section(2)).await;
        assert!(matches!(denied, Err(AppError::Forbidden(_))));
        let missing = authorize(&policy, &mut conn, owner, Resource::Quiz(99)).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
