// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use quiz_authoring::{
    config::Config, db, routes, services::ownership::CourseOwnership, state::AppState,
    utils::jwt::sign_jwt,
};
use reqwest::{Method, Response};
use serde_json::Value;
use sqlx::SqlitePool;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

pub const OWNER: i64 = 1;
pub const STRANGER: i64 = 2;

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port, backed by a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    let pool = db::connect_in_memory()
        .await
        .expect("Failed to create in-memory database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        rust_log: "error".to_string(),
        listen_addr: "127.0.0.1:0".to_string(),
        max_connections: 1,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
        policy: Arc::new(CourseOwnership),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
    }
}

pub fn token(user_id: i64) -> String {
    sign_jwt(user_id, JWT_SECRET, 600).expect("Failed to sign token")
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        user_id: i64,
        path: &str,
        body: Option<Value>,
    ) -> Response {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.address, path))
            .header("Authorization", format!("Bearer {}", token(user_id)));
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        builder.send().await.expect("Failed to execute request")
    }

    pub async fn get(&self, user_id: i64, path: &str) -> Response {
        self.request(Method::GET, user_id, path, None).await
    }

    pub async fn post(&self, user_id: i64, path: &str, body: Value) -> Response {
        self.request(Method::POST, user_id, path, Some(body)).await
    }

    pub async fn put(&self, user_id: i64, path: &str, body: Value) -> Response {
        self.request(Method::PUT, user_id, path, Some(body)).await
    }

    pub async fn patch(&self, user_id: i64, path: &str, body: Value) -> Response {
        self.request(Method::PATCH, user_id, path, Some(body)).await
    }

    pub async fn delete(&self, user_id: i64, path: &str) -> Response {
        self.request(Method::DELETE, user_id, path, None).await
    }

    /// Inserts a course owned by `owner_id` with one section; returns the
    /// section id.
    pub async fn seed_section(&self, owner_id: i64) -> i64 {
        let course_id = sqlx::query("INSERT INTO courses (owner_id, title) VALUES (?, 'Course')")
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .unwrap()
            .last_insert_rowid();

        sqlx::query("INSERT INTO sections (course_id, title) VALUES (?, 'Section')")
            .bind(course_id)
            .execute(&self.pool)
            .await
            .unwrap()
            .last_insert_rowid()
    }

    /// Creates a quiz through the API and returns the response body.
    pub async fn create_quiz(&self, owner_id: i64, section_id: i64, questions: Value) -> Value {
        let response = self
            .post(
                owner_id,
                "/api/quizzes",
                serde_json::json!({
                    "section_id": section_id,
                    "title": "Quiz",
                    "questions": questions,
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

/// A single-choice question definition with the first option correct.
pub fn single_choice(text: &str, options: &[&str]) -> Value {
    let options: Vec<Value> = options
        .iter()
        .enumerate()
        .map(|(i, o)| serde_json::json!({"text": o, "is_correct": i == 0}))
        .collect();
    serde_json::json!({"type": "single_choice", "text": text, "options": options})
}

pub fn keywords(text: &str, words: &[&str]) -> Value {
    let keywords: Vec<Value> = words
        .iter()
        .map(|w| serde_json::json!({"keyword": w}))
        .collect();
    serde_json::json!({"type": "keywords", "text": text, "keywords": keywords})
}

pub fn ids(values: &Value) -> Vec<i64> {
    values
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_i64().unwrap())
        .collect()
}
