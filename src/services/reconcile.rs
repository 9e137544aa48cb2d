// src/services/reconcile.rs

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use sqlx::SqliteConnection;

use crate::{
    error::{AppError, FieldError},
    models::{
        question::{AnswerKey, AnswerKeyDef, OptionDef, QuestionDef, QuestionDetail, QuestionInsert},
        record::{Content, Record, Scope, Stored},
    },
    services::repository,
};

/// An incoming entry that may name an existing row.
pub trait Claim {
    fn claimed_id(&self) -> Option<i64>;
}

impl Claim for QuestionDef {
    fn claimed_id(&self) -> Option<i64> {
        self.id
    }
}

impl Claim for OptionDef {
    fn claimed_id(&self) -> Option<i64> {
        self.id
    }
}

/// An incoming entry and the 1-based position it was listed at.
#[derive(Debug)]
pub struct Slot<'a, D> {
    pub position: i64,
    pub def: &'a D,
}

/// Partition of an incoming list against the ids currently stored.
#[derive(Debug)]
pub struct Plan<'a, D> {
    pub to_create: Vec<Slot<'a, D>>,
    pub to_update: Vec<(i64, Slot<'a, D>)>,
    pub to_delete: Vec<i64>,
}

impl<D: Claim> Plan<'_, D> {
    /// Ids the client sent that are not stored under this parent.
    pub fn stale_ids(&self) -> Vec<i64> {
        self.to_create
            .iter()
            .filter_map(|slot| slot.def.claimed_id())
            .collect()
    }
}

/// Matches incoming entries to existing ids.
///
/// An entry naming an existing id updates it; anything else (no id, or an
/// id not stored here) is created. Existing ids nobody claimed are deleted.
pub fn plan<'a, D: Claim>(existing_ids: &[i64], incoming: &'a [D]) -> Plan<'a, D> {
    let existing: HashSet<i64> = existing_ids.iter().copied().collect();
    let mut claimed = HashSet::new();
    let mut to_create = Vec::new();
    let mut to_update = Vec::new();

    for (index, def) in incoming.iter().enumerate() {
        let slot = Slot {
            position: index as i64 + 1,
            def,
        };
        match def.claimed_id() {
            Some(id) if existing.contains(&id) && claimed.insert(id) => to_update.push((id, slot)),
            _ => to_create.push(slot),
        }
    }

    let to_delete = existing_ids
        .iter()
        .copied()
        .filter(|id| !claimed.contains(id))
        .collect();

    Plan {
        to_create,
        to_update,
        to_delete,
    }
}

/// Row counts written for one kind of child.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Changes {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }

    fn merge(&mut self, other: Changes) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}

/// What a quiz update actually wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub quiz_updated: bool,
    pub questions: Changes,
    pub answer_keys: Changes,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        !self.quiz_updated && self.questions.is_empty() && self.answer_keys.is_empty()
    }
}

/// Reconciles the complete incoming question list of a quiz with what is
/// stored. Returns (question changes, answer-key changes).
///
/// Kind changes are rejected before anything is written.
pub async fn reconcile_questions(
    conn: &mut SqliteConnection,
    quiz_id: i64,
    existing: &[QuestionDetail],
    incoming: &[QuestionDef],
) -> Result<(Changes, Changes), AppError> {
    let existing_ids: Vec<i64> = existing.iter().map(|q| q.id).collect();
    let plan = plan(&existing_ids, incoming);
    let by_id: HashMap<i64, &QuestionDetail> = existing.iter().map(|q| (q.id, q)).collect();

    let violations: Vec<FieldError> = plan
        .to_update
        .iter()
        .filter_map(|(id, slot)| {
            let current = by_id.get(id)?;
            (current.kind() != slot.def.kind()).then(|| {
                FieldError::new(
                    format!("questions[{}].type", slot.position - 1),
                    "type_immutable",
                    format!(
                        "question {} is {} and cannot become {}",
                        id,
                        current.kind(),
                        slot.def.kind()
                    ),
                )
            })
        })
        .collect();
    if !violations.is_empty() {
        return Err(AppError::Validation(violations));
    }

    repository::ensure_not_foreign(conn, Scope::QuizQuestions, Some(quiz_id), &plan.stale_ids())
        .await?;

    let mut questions = Changes::default();
    let mut answer_keys = Changes::default();

    for id in &plan.to_delete {
        let removed = repository::delete_question(conn, *id).await?;
        questions.deleted += 1;
        answer_keys.deleted += removed as usize;
    }

    for (id, slot) in &plan.to_update {
        let Some(current) = by_id.get(id).copied() else {
            continue;
        };
        if current.fields != slot.def.fields || current.order != slot.position {
            let row = QuestionInsert {
                kind: current.kind(),
                fields: &slot.def.fields,
            };
            repository::update_record(conn, *id, slot.position, &row).await?;
            questions.updated += 1;
        }
        answer_keys.merge(sync_answer_key(conn, current, &slot.def.answer_key).await?);
    }

    for slot in &plan.to_create {
        if let AnswerKey::SingleChoice { options }
        | AnswerKey::MultipleChoice { options }
        | AnswerKey::TrueFalse { options } = &slot.def.answer_key
        {
            let claimed: Vec<i64> = options.iter().filter_map(|o| o.id).collect();
            repository::ensure_not_foreign(conn, Scope::QuestionOptions, None, &claimed).await?;
        }
        let (_, written) = repository::insert_question(
            conn,
            quiz_id,
            slot.position,
            &slot.def.fields,
            &slot.def.answer_key,
        )
        .await?;
        questions.created += 1;
        answer_keys.created += written;
    }

    Ok((questions, answer_keys))
}

async fn sync_answer_key(
    conn: &mut SqliteConnection,
    current: &QuestionDetail,
    incoming: &AnswerKeyDef,
) -> Result<Changes, AppError> {
    match (&current.answer_key, incoming) {
        (AnswerKey::SingleChoice { options: stored }, AnswerKey::SingleChoice { options: wanted })
        | (
            AnswerKey::MultipleChoice { options: stored },
            AnswerKey::MultipleChoice { options: wanted },
        )
        | (AnswerKey::TrueFalse { options: stored }, AnswerKey::TrueFalse { options: wanted }) => {
            reconcile_rows(conn, current.id, stored, wanted).await
        }
        (
            AnswerKey::Matching { matching_pairs: stored },
            AnswerKey::Matching { matching_pairs: wanted },
        )
        | (
            AnswerKey::ImageMatching { matching_pairs: stored },
            AnswerKey::ImageMatching { matching_pairs: wanted },
        ) => replace_rows(conn, current.id, stored, wanted).await,
        (AnswerKey::Keywords { keywords: stored }, AnswerKey::Keywords { keywords: wanted }) => {
            replace_rows(conn, current.id, stored, wanted).await
        }
        (AnswerKey::FillGap { gaps: stored }, AnswerKey::FillGap { gaps: wanted }) => {
            replace_rows(conn, current.id, stored, wanted).await
        }
        (stored, wanted) => Err(AppError::invalid(
            "type",
            "type_immutable",
            format!(
                "question {} is {} and cannot become {}",
                current.id,
                stored.kind(),
                wanted.kind()
            ),
        )),
    }
}

/// Row-by-row reconciliation for collections whose entries carry ids.
pub async fn reconcile_rows<S, D>(
    conn: &mut SqliteConnection,
    parent_id: i64,
    stored: &[S],
    incoming: &[D],
) -> Result<Changes, AppError>
where
    S: Stored,
    D: Claim + Content<S::Fields> + Sync,
{
    let scope = <S::Fields as Record>::SCOPE;
    let ids: Vec<i64> = stored.iter().map(|row| row.id()).collect();
    let plan = plan(&ids, incoming);
    let by_id: HashMap<i64, &S> = stored.iter().map(|row| (row.id(), row)).collect();

    repository::ensure_not_foreign(conn, scope, Some(parent_id), &plan.stale_ids()).await?;

    let mut changes = Changes::default();
    for id in &plan.to_delete {
        repository::delete_row(conn, scope, *id).await?;
        changes.deleted += 1;
    }
    for (id, slot) in &plan.to_update {
        let Some(current) = by_id.get(id) else {
            continue;
        };
        if current.fields() != slot.def.content() || current.order() != slot.position {
            repository::update_record(conn, *id, slot.position, slot.def.content()).await?;
            changes.updated += 1;
        }
    }
    for slot in &plan.to_create {
        repository::insert_record(conn, parent_id, slot.position, slot.def.content()).await?;
        changes.created += 1;
    }

    Ok(changes)
}

/// Replaces an id-less collection, unless it already matches.
pub async fn replace_rows<S, C>(
    conn: &mut SqliteConnection,
    parent_id: i64,
    stored: &[S],
    incoming: &[C],
) -> Result<Changes, AppError>
where
    S: Stored,
    C: Content<S::Fields> + Sync,
{
    let unchanged = stored.len() == incoming.len()
        && stored
            .iter()
            .zip(incoming)
            .enumerate()
            .all(|(index, (row, wanted))| {
                row.fields() == wanted.content() && row.order() == index as i64 + 1
            });
    if unchanged {
        return Ok(Changes::default());
    }

    let scope = <S::Fields as Record>::SCOPE;
    let deleted = repository::delete_children(conn, scope, parent_id).await?;
    let created = repository::insert_all::<C, S::Fields>(conn, parent_id, incoming).await?;

    Ok(Changes {
        created,
        updated: 0,
        deleted: deleted as usize,
    })
}
