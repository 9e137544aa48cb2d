// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, patch, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{course, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Every `/api` route requires a bearer token.
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, ownership policy).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let quiz_routes = Router::new()
        .route("/", post(quiz::create_quiz))
        .route(
            "/{id}",
            get(quiz::get_quiz)
                .put(quiz::update_quiz)
                .patch(quiz::patch_quiz)
                .delete(quiz::delete_quiz),
        )
        .route("/{id}/reorder", post(quiz::reorder_questions))
        .route("/{id}/clone", post(quiz::clone_quiz))
        .route("/{id}/questions/import", post(quiz::import_questions))
        .route(
            "/{id}/questions/{question_id}",
            patch(quiz::patch_question).delete(quiz::delete_question),
        )
        .route(
            "/{id}/questions/{question_id}/options/reorder",
            post(quiz::reorder_options),
        );

    let section_routes =
        Router::new().route("/{id}/quizzes/reorder", post(course::reorder_quizzes));

    let lesson_routes = Router::new().route("/{id}/clone", post(course::clone_lesson));

    let assignment_routes = Router::new().route("/{id}/clone", post(course::clone_assignment));

    let api_routes = Router::new()
        .nest("/quizzes", quiz_routes)
        .nest("/sections", section_routes)
        .nest("/lessons", lesson_routes)
        .nest("/assignments", assignment_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
