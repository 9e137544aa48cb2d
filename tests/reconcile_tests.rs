// tests/reconcile_tests.rs

mod common;

use common::{OWNER, ids, keywords, single_choice, spawn_app};
use quiz_authoring::{
    error::AppError,
    models::quiz::QuizRequest,
    services::{
        authoring,
        ownership::{Actor, CourseOwnership},
    },
};
use serde_json::{Value, json};

fn as_request(quiz: &Value) -> QuizRequest {
    serde_json::from_value(quiz.clone()).expect("a returned quiz is a valid request")
}

#[tokio::test]
async fn resubmitting_a_returned_quiz_changes_nothing() {
    // Arrange
    let app = spawn_app().await;
    let section_id = app.seed_section(OWNER).await;
    let quiz = app
        .create_quiz(
            OWNER,
            section_id,
            json!([
                single_choice("Pick <b>one</b>", &["A", "B"]),
                {"type": "multiple_choice", "text": "Pick many", "options": [
                    {"text": "A", "is_correct": true}, {"text": "B", "is_correct": true}, {"text": "C"}
                ]},
                {"type": "true_false", "text": "Sky & sea are blue"},
                {"type": "matching", "text": "Match", "matching_pairs": [
                    {"pair_key": "a", "prompt_text": "1", "answer_text": "one"},
                    {"pair_key": "b", "prompt_text": "2", "answer_text": "two", "points": 2.5}
                ]},
                {"type": "image_matching", "text": "Match images", "matching_pairs": [
                    {"pair_key": "a", "prompt_image_url": "https://cdn.example.com/a.png", "answer_text": "A"},
                    {"pair_key": "b", "prompt_image_url": "https://cdn.example.com/b.png", "answer_text": "B"}
                ]},
                keywords("Capital?", &["Paris", "Lutetia"]),
                {"type": "fill_gap", "text": "{{a}} and {{b}}", "gaps": [
                    {"gap_identifier": "a", "correct_text": "x", "case_sensitive": true},
                    {"gap_identifier": "b", "correct_text": "y"}
                ]}
            ]),
        )
        .await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let actor = Actor { id: OWNER };

    // Act
    let (reloaded, report) = authoring::update_quiz(
        &app.pool,
        &CourseOwnership,
        actor,
        quiz_id,
        as_request(&quiz),
    )
    .await
    .unwrap();

    // Assert
    assert!(report.is_noop(), "unexpected writes: {:?}", report);
    assert_eq!(reloaded.quiz.version, 1);
    assert_eq!(serde_json::to_value(&reloaded).unwrap(), quiz);

    // A second pass is still a fixed point.
    let (_, again) = authoring::update_quiz(
        &app.pool,
        &CourseOwnership,
        actor,
        quiz_id,
        as_request(&quiz),
    )
    .await
    .unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn edited_keyword_collection_is_replaced() {
    let app = spawn_app().await;
    let section_id = app.seed_section(OWNER).await;
    let quiz = app
        .create_quiz(OWNER, section_id, json!([keywords("Words", &["a", "b"])]))
        .await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let old_ids = ids(&quiz["questions"][0]["keywords"]);

    let mut edited = quiz.clone();
    edited["questions"][0]["keywords"] = json!([{"keyword": "a"}, {"keyword": "c"}]);

    let (reloaded, report) = authoring::update_quiz(
        &app.pool,
        &CourseOwnership,
        Actor { id: OWNER },
        quiz_id,
        as_request(&edited),
    )
    .await
    .unwrap();

    assert_eq!(report.questions.updated, 0);
    assert_eq!(report.answer_keys.deleted, 2);
    assert_eq!(report.answer_keys.created, 2);
    assert_eq!(reloaded.quiz.version, 2);

    let value = serde_json::to_value(&reloaded).unwrap();
    let words: Vec<&str> = value["questions"][0]["keywords"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["keyword"].as_str().unwrap())
        .collect();
    assert_eq!(words, vec!["a", "c"]);
    for id in ids(&value["questions"][0]["keywords"]) {
        assert!(!old_ids.contains(&id));
    }
}

#[tokio::test]
async fn option_id_of_another_question_rolls_back_everything() {
    let app = spawn_app().await;
    let section_id = app.seed_section(OWNER).await;
    let quiz = app
        .create_quiz(
            OWNER,
            section_id,
            json!([single_choice("One", &["A", "B"]), single_choice("Two", &["C", "D"])]),
        )
        .await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    let foreign_option = quiz["questions"][1]["options"][0]["id"].clone();

    let mut edited = quiz.clone();
    edited["title"] = json!("Renamed");
    edited["questions"][0]["text"] = json!("One edited");
    edited["questions"][0]["options"][1]["id"] = foreign_option;

    let result = authoring::update_quiz(
        &app.pool,
        &CourseOwnership,
        Actor { id: OWNER },
        quiz_id,
        as_request(&edited),
    )
    .await;

    assert!(matches!(result, Err(AppError::Integrity(_))));

    let stored: Value = app
        .get(OWNER, &format!("/api/quizzes/{}", quiz_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(stored, quiz);
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let app = spawn_app().await;
    let section_id = app.seed_section(OWNER).await;
    let quiz = app
        .create_quiz(OWNER, section_id, json!([keywords("Q", &["k"])]))
        .await;
    let path = format!("/api/quizzes/{}", quiz["id"]);

    let mut first = quiz.clone();
    first["title"] = json!("First writer");
    let ok = app.put(OWNER, &path, first).await;
    assert_eq!(ok.status().as_u16(), 200);
    let body: Value = ok.json().await.unwrap();
    assert_eq!(body["version"], 2);

    let mut second = quiz.clone();
    second["title"] = json!("Second writer");
    let conflict = app.put(OWNER, &path, second).await;
    assert_eq!(conflict.status().as_u16(), 409);
    let error: Value = conflict.json().await.unwrap();
    assert_eq!(error["kind"], "conflict");

    let stored: Value = app.get(OWNER, &path).await.json().await.unwrap();
    assert_eq!(stored["title"], "First writer");
}

#[tokio::test]
async fn empty_question_list_clears_the_quiz() {
    let app = spawn_app().await;
    let section_id = app.seed_section(OWNER).await;
    let quiz = app
        .create_quiz(
            OWNER,
            section_id,
            json!([single_choice("One", &["A", "B"]), keywords("Two", &["k"])]),
        )
        .await;

    let response = app
        .put(
            OWNER,
            &format!("/api/quizzes/{}", quiz["id"]),
            json!({"title": "Quiz", "questions": []}),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(app.count("questions").await, 0);
    assert_eq!(app.count("question_options").await, 0);
    assert_eq!(app.count("keyword_answers").await, 0);
}
