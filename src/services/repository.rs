// src/services/repository.rs

use std::collections::HashMap;

use sqlx::{SqliteConnection, sqlite::SqliteRow};

use crate::{
    error::{AppError, field_errors},
    models::{
        question::{
            AnswerKey, ChoiceOption, GapAnswer, GapFields, KeywordAnswer, KeywordFields,
            MatchingPair, OptionFields, PairFields, QuestionDetail, QuestionFields,
            QuestionInsert, QuestionKind, QuestionRow,
        },
        quiz::{QuizDetail, QuizRow},
        record::{Content, Record, Scope, Stored},
    },
};

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn check<R: Record>(record: &R) -> Result<(), AppError> {
    record
        .validate()
        .map_err(|e| AppError::Validation(field_errors(R::SCOPE.entity(), &e)))
}

/// Validates and inserts one row at `order` under `parent_id`.
pub async fn insert_record<R: Record>(
    conn: &mut SqliteConnection,
    parent_id: i64,
    order: i64,
    record: &R,
) -> Result<i64, AppError> {
    check(record)?;

    let scope = R::SCOPE;
    let sql = format!(
        "INSERT INTO {} ({}, sort_order, {}) VALUES (?, ?, {})",
        scope.table(),
        scope.parent_column(),
        R::COLUMNS.join(", "),
        placeholders(R::COLUMNS.len())
    );

    let mut query = sqlx::query(&sql).bind(parent_id).bind(order);
    for value in record.values() {
        query = value.bind_to(query);
    }

    let result = query.execute(&mut *conn).await.map_err(|e| {
        tracing::error!("Failed to insert {}: {:?}", scope.entity(), e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(result.last_insert_rowid())
}

/// Validates and overwrites the content and position of one row.
pub async fn update_record<R: Record>(
    conn: &mut SqliteConnection,
    id: i64,
    order: i64,
    record: &R,
) -> Result<(), AppError> {
    check(record)?;

    let assignments: Vec<String> = R::COLUMNS.iter().map(|c| format!("{} = ?", c)).collect();
    let sql = format!(
        "UPDATE {} SET sort_order = ?, {} WHERE id = ?",
        R::SCOPE.table(),
        assignments.join(", ")
    );

    let mut query = sqlx::query(&sql).bind(order);
    for value in record.values() {
        query = value.bind_to(query);
    }
    query.bind(id).execute(&mut *conn).await?;

    Ok(())
}

/// Inserts a collection at positions 1..n.
pub async fn insert_all<C, F>(
    conn: &mut SqliteConnection,
    parent_id: i64,
    items: &[C],
) -> Result<usize, AppError>
where
    C: Content<F> + Sync,
    F: Record,
{
    for (index, item) in items.iter().enumerate() {
        insert_record(conn, parent_id, index as i64 + 1, item.content()).await?;
    }
    Ok(items.len())
}

pub async fn fetch_row<S>(
    conn: &mut SqliteConnection,
    scope: Scope,
    id: i64,
) -> Result<Option<S>, AppError>
where
    S: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
{
    let sql = format!("SELECT * FROM {} WHERE id = ?", scope.table());
    let row = sqlx::query_as::<_, S>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

/// Rows of a scope in display order.
pub async fn fetch_children<S>(
    conn: &mut SqliteConnection,
    scope: Scope,
    parent_id: i64,
) -> Result<Vec<S>, AppError>
where
    S: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
{
    let sql = format!(
        "SELECT * FROM {} WHERE {} = ? ORDER BY sort_order, id",
        scope.table(),
        scope.parent_column()
    );
    let rows = sqlx::query_as::<_, S>(&sql)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

pub async fn parent_of(
    conn: &mut SqliteConnection,
    scope: Scope,
    id: i64,
) -> Result<Option<i64>, AppError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?",
        scope.parent_column(),
        scope.table()
    );
    let parent: Option<i64> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(parent)
}

/// Rejects ids that exist under a parent other than `parent_id`.
///
/// `None` means the parent is being created, so any existing row is
/// foreign. Ids that do not exist at all pass.
pub async fn ensure_not_foreign(
    conn: &mut SqliteConnection,
    scope: Scope,
    parent_id: Option<i64>,
    ids: &[i64],
) -> Result<(), AppError> {
    for id in ids {
        if let Some(owner) = parent_of(conn, scope, *id).await? {
            if Some(owner) != parent_id {
                return Err(AppError::Integrity(format!(
                    "{} {} belongs to another {}",
                    scope.entity(),
                    id,
                    scope.parent_entity()
                )));
            }
        }
    }
    Ok(())
}

pub async fn delete_row(conn: &mut SqliteConnection, scope: Scope, id: i64) -> Result<u64, AppError> {
    let sql = format!("DELETE FROM {} WHERE id = ?", scope.table());
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

pub async fn delete_children(
    conn: &mut SqliteConnection,
    scope: Scope,
    parent_id: i64,
) -> Result<u64, AppError> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        scope.table(),
        scope.parent_column()
    );
    let result = sqlx::query(&sql).bind(parent_id).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Deletes a question and its answer-key rows. Returns the number of
/// answer-key rows removed.
pub async fn delete_question(conn: &mut SqliteConnection, question_id: i64) -> Result<u64, AppError> {
    let mut removed = 0;
    for scope in Scope::ANSWER_KEYS {
        removed += delete_children(conn, scope, question_id).await?;
    }
    delete_row(conn, Scope::QuizQuestions, question_id).await?;
    Ok(removed)
}

/// Deletes a quiz, its questions and their answer keys.
pub async fn delete_quiz(conn: &mut SqliteConnection, quiz_id: i64) -> Result<u64, AppError> {
    let question_ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM questions WHERE quiz_id = ?")
            .bind(quiz_id)
            .fetch_all(&mut *conn)
            .await?;

    for question_id in &question_ids {
        delete_question(conn, *question_id).await?;
    }

    delete_row(conn, Scope::SectionQuizzes, quiz_id).await
}

/// Inserts a question row with its answer key. Returns the new id and the
/// number of answer-key rows written.
pub async fn insert_question<O, P, K, G>(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    order: i64,
    fields: &QuestionFields,
    answer_key: &AnswerKey<O, P, K, G>,
) -> Result<(i64, usize), AppError>
where
    O: Content<OptionFields> + Sync,
    P: Content<PairFields> + Sync,
    K: Content<KeywordFields> + Sync,
    G: Content<GapFields> + Sync,
{
    let row = QuestionInsert {
        kind: answer_key.kind(),
        fields,
    };
    let question_id = insert_record(conn, quiz_id, order, &row).await?;
    let written = insert_answer_key(conn, question_id, answer_key).await?;
    Ok((question_id, written))
}

pub async fn insert_answer_key<O, P, K, G>(
    conn: &mut SqliteConnection,
    question_id: i64,
    answer_key: &AnswerKey<O, P, K, G>,
) -> Result<usize, AppError>
where
    O: Content<OptionFields> + Sync,
    P: Content<PairFields> + Sync,
    K: Content<KeywordFields> + Sync,
    G: Content<GapFields> + Sync,
{
    match answer_key {
        AnswerKey::SingleChoice { options }
        | AnswerKey::MultipleChoice { options }
        | AnswerKey::TrueFalse { options } => {
            insert_all::<O, OptionFields>(conn, question_id, options.as_slice()).await
        }
        AnswerKey::Matching { matching_pairs } | AnswerKey::ImageMatching { matching_pairs } => {
            insert_all::<P, PairFields>(conn, question_id, matching_pairs.as_slice()).await
        }
        AnswerKey::Keywords { keywords } => {
            insert_all::<K, KeywordFields>(conn, question_id, keywords.as_slice()).await
        }
        AnswerKey::FillGap { gaps } => {
            insert_all::<G, GapFields>(conn, question_id, gaps.as_slice()).await
        }
    }
}

/// Answer-key rows for a set of questions, grouped by question id.
#[derive(Default)]
struct AnswerRows {
    options: HashMap<i64, Vec<ChoiceOption>>,
    pairs: HashMap<i64, Vec<MatchingPair>>,
    keywords: HashMap<i64, Vec<KeywordAnswer>>,
    gaps: HashMap<i64, Vec<GapAnswer>>,
}

fn group<S: Stored>(rows: Vec<S>) -> HashMap<i64, Vec<S>> {
    let mut grouped: HashMap<i64, Vec<S>> = HashMap::new();
    for row in rows {
        grouped.entry(row.parent_id()).or_default().push(row);
    }
    grouped
}

fn take<S>(grouped: &mut HashMap<i64, Vec<S>>, question_id: i64) -> Vec<S> {
    grouped.remove(&question_id).unwrap_or_default()
}

/// Which questions' answer keys to load.
#[derive(Clone, Copy)]
enum Owner {
    Quiz(i64),
    Question(i64),
}

async fn fetch_answer_scope<S>(
    conn: &mut SqliteConnection,
    scope: Scope,
    owner: Owner,
) -> Result<Vec<S>, AppError>
where
    S: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
{
    let (filter, id) = match owner {
        Owner::Quiz(id) => ("question_id IN (SELECT id FROM questions WHERE quiz_id = ?)", id),
        Owner::Question(id) => ("question_id = ?", id),
    };
    let sql = format!(
        "SELECT * FROM {} WHERE {} ORDER BY question_id, sort_order, id",
        scope.table(),
        filter
    );
    let rows = sqlx::query_as::<_, S>(&sql)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows)
}

async fn fetch_answer_rows(conn: &mut SqliteConnection, owner: Owner) -> Result<AnswerRows, AppError> {
    Ok(AnswerRows {
        options: group(fetch_answer_scope(conn, Scope::QuestionOptions, owner).await?),
        pairs: group(fetch_answer_scope(conn, Scope::QuestionPairs, owner).await?),
        keywords: group(fetch_answer_scope(conn, Scope::QuestionKeywords, owner).await?),
        gaps: group(fetch_answer_scope(conn, Scope::QuestionGaps, owner).await?),
    })
}

fn attach(row: QuestionRow, rows: &mut AnswerRows) -> Result<QuestionDetail, AppError> {
    let kind = row
        .kind
        .parse::<QuestionKind>()
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let id = row.id;

    let answer_key = match kind {
        QuestionKind::SingleChoice => AnswerKey::SingleChoice {
            options: take(&mut rows.options, id),
        },
        QuestionKind::MultipleChoice => AnswerKey::MultipleChoice {
            options: take(&mut rows.options, id),
        },
        QuestionKind::TrueFalse => AnswerKey::TrueFalse {
            options: take(&mut rows.options, id),
        },
        QuestionKind::Matching => AnswerKey::Matching {
            matching_pairs: take(&mut rows.pairs, id),
        },
        QuestionKind::ImageMatching => AnswerKey::ImageMatching {
            matching_pairs: take(&mut rows.pairs, id),
        },
        QuestionKind::Keywords => AnswerKey::Keywords {
            keywords: take(&mut rows.keywords, id),
        },
        QuestionKind::FillGap => AnswerKey::FillGap {
            gaps: take(&mut rows.gaps, id),
        },
    };

    Ok(QuestionDetail {
        id,
        quiz_id: row.quiz_id,
        order: row.order,
        fields: row.fields,
        answer_key,
    })
}

/// Loads a quiz with every question and answer key, in order.
pub async fn load_quiz(conn: &mut SqliteConnection, quiz_id: i64) -> Result<QuizDetail, AppError> {
    let quiz: QuizRow = fetch_row(conn, Scope::SectionQuizzes, quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("quiz {} not found", quiz_id)))?;

    let question_rows: Vec<QuestionRow> =
        fetch_children(conn, Scope::QuizQuestions, quiz_id).await?;
    let mut answers = fetch_answer_rows(conn, Owner::Quiz(quiz_id)).await?;

    let questions = question_rows
        .into_iter()
        .map(|row| attach(row, &mut answers))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QuizDetail { quiz, questions })
}

pub async fn load_question(
    conn: &mut SqliteConnection,
    question_id: i64,
) -> Result<QuestionDetail, AppError> {
    let row: QuestionRow = fetch_row(conn, Scope::QuizQuestions, question_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("question {} not found", question_id)))?;

    let mut answers = fetch_answer_rows(conn, Owner::Question(question_id)).await?;
    attach(row, &mut answers)
}

/// Marks a quiz as changed: bumps its version and refreshes `updated_at`.
pub async fn touch_quiz(conn: &mut SqliteConnection, quiz_id: i64) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE quizzes
         SET version = version + 1,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?",
    )
    .bind(quiz_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
