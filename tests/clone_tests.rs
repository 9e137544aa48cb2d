// tests/clone_tests.rs

mod common;

use common::{OWNER, STRANGER, keywords, single_choice, spawn_app};
use serde_json::{Map, Value, json};

const IDENTITY_KEYS: [&str; 8] = [
    "id",
    "quiz_id",
    "question_id",
    "section_id",
    "order",
    "version",
    "created_at",
    "updated_at",
];

const QUIZ_TABLES: [&str; 6] = [
    "quizzes",
    "questions",
    "question_options",
    "matching_pairs",
    "keyword_answers",
    "gap_answers",
];

async fn quiz_row_counts(app: &common::TestApp) -> Vec<i64> {
    let mut counts = Vec::new();
    for table in QUIZ_TABLES {
        counts.push(app.count(table).await);
    }
    counts
}

/// Drops ids, parents, positions and timestamps, keeping content.
fn content_of(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !IDENTITY_KEYS.contains(&key.as_str()))
                .map(|(key, v)| (key.clone(), content_of(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(content_of).collect()),
        other => other.clone(),
    }
}

fn collect_ids(value: &Value, out: &mut Vec<i64>) {
    match value {
        Value::Object(map) => {
            if let Some(id) = map.get("id").and_then(Value::as_i64) {
                out.push(id);
            }
            map.values().for_each(|v| collect_ids(v, out));
        }
        Value::Array(items) => items.iter().for_each(|v| collect_ids(v, out)),
        _ => {}
    }
}

fn sample_questions() -> Value {
    json!([
        single_choice("Pick", &["A", "B", "C"]),
        {"type": "matching", "text": "Match", "matching_pairs": [
            {"pair_key": "a", "prompt_text": "1", "answer_text": "one"},
            {"pair_key": "b", "prompt_text": "2", "answer_text": "two"}
        ]},
        keywords("Words", &["x", "y"]),
        {"type": "fill_gap", "text": "{{g}}", "gaps": [{"gap_identifier": "g", "correct_text": "z"}]}
    ])
}

#[tokio::test]
async fn cloned_quiz_matches_source_with_fresh_ids() {
    // Arrange
    let app = spawn_app().await;
    let source_section = app.seed_section(OWNER).await;
    let target_section = app.seed_section(OWNER).await;
    let existing = app.create_quiz(OWNER, target_section, json!([])).await;
    let source = app
        .create_quiz(OWNER, source_section, sample_questions())
        .await;

    // Act
    let response = app
        .post(
            OWNER,
            &format!("/api/quizzes/{}/clone", source["id"]),
            json!({"section_id": target_section}),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    let copy: Value = app
        .get(OWNER, &format!("/api/quizzes/{}", body["id"]))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(content_of(&copy), content_of(&source));
    assert_eq!(copy["section_id"].as_i64().unwrap(), target_section);
    assert_eq!(copy["order"], 2);
    assert_ne!(copy["id"], existing["id"]);

    let mut source_ids = Vec::new();
    let mut copy_ids = Vec::new();
    collect_ids(&source, &mut source_ids);
    collect_ids(&copy, &mut copy_ids);
    assert!(copy_ids.iter().all(|id| !source_ids.contains(id)));
}

#[tokio::test]
async fn clone_requires_owning_source_and_target() {
    let app = spawn_app().await;
    let mine = app.seed_section(OWNER).await;
    let theirs = app.seed_section(STRANGER).await;
    let quiz = app.create_quiz(OWNER, mine, sample_questions()).await;
    let quizzes_before = app.count("quizzes").await;

    // Into someone else's section.
    let into_theirs = app
        .post(
            OWNER,
            &format!("/api/quizzes/{}/clone", quiz["id"]),
            json!({"section_id": theirs}),
        )
        .await;
    assert_eq!(into_theirs.status().as_u16(), 403);

    // Someone else copying my quiz into their section.
    let stolen = app
        .post(
            STRANGER,
            &format!("/api/quizzes/{}/clone", quiz["id"]),
            json!({"section_id": theirs}),
        )
        .await;
    assert_eq!(stolen.status().as_u16(), 403);
    let body: Value = stolen.json().await.unwrap();
    assert_eq!(body["kind"], "ownership");

    assert_eq!(app.count("quizzes").await, quizzes_before);
}

#[tokio::test]
async fn malformed_source_row_rolls_back_the_whole_clone() {
    // Arrange: a quiz whose last question carries an empty keyword, written
    // behind the API's back.
    let app = spawn_app().await;
    let section_id = app.seed_section(OWNER).await;
    let quiz = app.create_quiz(OWNER, section_id, sample_questions()).await;
    let broken_keyword = quiz["questions"][2]["keywords"][1]["id"].as_i64().unwrap();
    sqlx::query("UPDATE keyword_answers SET keyword = '' WHERE id = ?")
        .bind(broken_keyword)
        .execute(&app.pool)
        .await
        .unwrap();

    let before = quiz_row_counts(&app).await;

    // Act
    let response = app
        .post(
            OWNER,
            &format!("/api/quizzes/{}/clone", quiz["id"]),
            json!({"section_id": section_id}),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation");
    assert_eq!(quiz_row_counts(&app).await, before);
}

#[tokio::test]
async fn lesson_and_assignment_clone_with_children() {
    // Arrange
    let app = spawn_app().await;
    let source_section = app.seed_section(OWNER).await;
    let target_section = app.seed_section(OWNER).await;

    let lesson_id = sqlx::query(
        "INSERT INTO lessons (section_id, sort_order, title, content) VALUES (?, 1, 'Intro', 'Welcome')",
    )
    .bind(source_section)
    .execute(&app.pool)
    .await
    .unwrap()
    .last_insert_rowid();
    for (order, title) in [(1, "Slides"), (2, "Reading")] {
        sqlx::query(
            "INSERT INTO lesson_resources (lesson_id, sort_order, title, url) VALUES (?, ?, ?, 'https://example.com/r')",
        )
        .bind(lesson_id)
        .bind(order)
        .bind(title)
        .execute(&app.pool)
        .await
        .unwrap();
    }

    let assignment_id = sqlx::query(
        "INSERT INTO assignments (section_id, sort_order, title, instructions, max_points) VALUES (?, 1, 'Essay', 'Write', 20)",
    )
    .bind(source_section)
    .execute(&app.pool)
    .await
    .unwrap()
    .last_insert_rowid();
    sqlx::query(
        "INSERT INTO assignment_criteria (assignment_id, sort_order, title, description, points) VALUES (?, 1, 'Clarity', '', 10)",
    )
    .bind(assignment_id)
    .execute(&app.pool)
    .await
    .unwrap();

    // Act
    let lesson = app
        .post(
            OWNER,
            &format!("/api/lessons/{}/clone", lesson_id),
            json!({"section_id": target_section}),
        )
        .await;
    let assignment = app
        .post(
            OWNER,
            &format!("/api/assignments/{}/clone", assignment_id),
            json!({"section_id": target_section}),
        )
        .await;

    // Assert
    assert_eq!(lesson.status().as_u16(), 201);
    assert_eq!(assignment.status().as_u16(), 201);
    let new_lesson: Value = lesson.json().await.unwrap();
    let new_lesson_id = new_lesson["id"].as_i64().unwrap();
    assert_ne!(new_lesson_id, lesson_id);

    let copied: Vec<(String, i64)> = sqlx::query_as(
        "SELECT title, sort_order FROM lesson_resources WHERE lesson_id = ? ORDER BY sort_order",
    )
    .bind(new_lesson_id)
    .fetch_all(&app.pool)
    .await
    .unwrap();
    assert_eq!(
        copied,
        vec![("Slides".to_string(), 1), ("Reading".to_string(), 2)]
    );

    let new_assignment: Value = assignment.json().await.unwrap();
    let criteria: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM assignment_criteria WHERE assignment_id = ?")
            .bind(new_assignment["id"].as_i64().unwrap())
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(criteria, 1);
    assert_eq!(app.count("assignment_criteria").await, 2);

    let missing = app
        .post(
            OWNER,
            "/api/lessons/9999/clone",
            json!({"section_id": target_section}),
        )
        .await;
    assert_eq!(missing.status().as_u16(), 404);
}
