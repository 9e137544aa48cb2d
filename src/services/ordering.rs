// src/services/ordering.rs

use std::collections::HashSet;

use sqlx::SqliteConnection;

use crate::{
    error::{AppError, FieldError},
    models::record::Scope,
};

/// Position for a row appended to the end of a scope (1 for an empty one).
pub async fn next_order(
    conn: &mut SqliteConnection,
    parent_id: i64,
    scope: Scope,
) -> Result<i64, AppError> {
    let sql = format!(
        "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM {} WHERE {} = ?",
        scope.table(),
        scope.parent_column()
    );

    let next: i64 = sqlx::query_scalar(&sql)
        .bind(parent_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(next)
}

/// Ids of a scope in display order.
pub async fn ordered_ids(
    conn: &mut SqliteConnection,
    parent_id: i64,
    scope: Scope,
) -> Result<Vec<i64>, AppError> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = ? ORDER BY sort_order, id",
        scope.table(),
        scope.parent_column()
    );

    let ids: Vec<i64> = sqlx::query_scalar(&sql)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(ids)
}

/// Sets `ordered_ids[i]` to position `i + 1`.
///
/// Ids of the scope that are not listed keep their position. Every listed
/// id must belong to the scope, otherwise nothing is written.
pub async fn reassign(
    conn: &mut SqliteConnection,
    parent_id: i64,
    scope: Scope,
    ids: &[i64],
) -> Result<usize, AppError> {
    let mut seen = HashSet::new();
    let duplicates: Vec<FieldError> = ids
        .iter()
        .enumerate()
        .filter(|(_, id)| !seen.insert(**id))
        .map(|(index, id)| {
            FieldError::new(
                format!("ordered_ids[{}]", index),
                "duplicate_id",
                format!("{} {} is listed more than once", scope.entity(), id),
            )
        })
        .collect();
    if !duplicates.is_empty() {
        return Err(AppError::Validation(duplicates));
    }

    let members: HashSet<i64> = ordered_ids(conn, parent_id, scope)
        .await?
        .into_iter()
        .collect();
    if let Some(foreign) = ids.iter().find(|id| !members.contains(id)) {
        return Err(AppError::Integrity(format!(
            "{} {} does not belong to {} {}",
            scope.entity(),
            foreign,
            scope.parent_entity(),
            parent_id
        )));
    }

    let sql = format!(
        "UPDATE {} SET sort_order = ? WHERE id = ? AND {} = ?",
        scope.table(),
        scope.parent_column()
    );
    for (index, id) in ids.iter().enumerate() {
        sqlx::query(&sql)
            .bind(index as i64 + 1)
            .bind(id)
            .bind(parent_id)
            .execute(&mut *conn)
            .await?;
    }

    Ok(ids.len())
}

/// Renumbers a scope to 1..n, keeping relative order. Used after a delete.
pub async fn restamp(
    conn: &mut SqliteConnection,
    parent_id: i64,
    scope: Scope,
) -> Result<(), AppError> {
    let sql = format!(
        "SELECT id, sort_order FROM {} WHERE {} = ? ORDER BY sort_order, id",
        scope.table(),
        scope.parent_column()
    );
    let rows: Vec<(i64, i64)> = sqlx::query_as(&sql)
        .bind(parent_id)
        .fetch_all(&mut *conn)
        .await?;

    let update = format!("UPDATE {} SET sort_order = ? WHERE id = ?", scope.table());
    for (index, (id, order)) in rows.into_iter().enumerate() {
        let position = index as i64 + 1;
        if order != position {
            sqlx::query(&update)
                .bind(position)
                .bind(id)
                .execute(&mut *conn)
                .await?;
        }
    }

    Ok(())
}
