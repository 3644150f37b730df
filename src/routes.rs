use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{elevated, protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::AppState;

/// The full HTTP surface bound to `state`
pub fn app(state: AppState) -> Router {
    let protected_api = Router::new()
        .merge(auth_routes())
        .merge(course_routes())
        .merge(content_routes())
        .merge(quiz_routes())
        .merge(session_routes())
        .merge(admin_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let router = Router::new()
        // Public
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .route("/auth/register", post(public::auth::register_post))
        // Protected API
        .merge(protected_api)
        .layer(CorsLayer::permissive());

    let router = if state.config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.with_state(state)
}

fn auth_routes() -> Router<AppState> {
    Router::new().route("/api/auth/whoami", get(protected::auth::whoami_get))
}

fn course_routes() -> Router<AppState> {
    use protected::{courses, membership};

    Router::new()
        .route("/api/courses", post(courses::course_post))
        .route(
            "/api/courses/:course",
            get(courses::course_get)
                .patch(courses::course_patch)
                .delete(courses::course_delete),
        )
        .route("/api/courses/:course/role", get(courses::role_get))
        // Membership
        .route("/api/join", post(membership::join_code_post))
        .route("/api/courses/:course/join", post(membership::join_post))
        .route("/api/courses/:course/leave", post(membership::leave_post))
        .route("/api/courses/:course/members", get(membership::members_get))
        .route(
            "/api/courses/:course/members/:user",
            axum::routing::delete(membership::member_delete),
        )
        .route(
            "/api/courses/:course/members/:user/role",
            put(membership::member_role_put),
        )
        .route("/api/courses/:course/requests", get(membership::requests_get))
        .route(
            "/api/courses/:course/requests/:request",
            post(membership::request_decision_post),
        )
}

fn content_routes() -> Router<AppState> {
    use protected::content;

    Router::new()
        .route(
            "/api/courses/:course/sections",
            get(content::sections_get).post(content::section_post),
        )
        .route(
            "/api/sections/:section",
            axum::routing::patch(content::section_patch).delete(content::section_delete),
        )
        .route(
            "/api/sections/:section/blocks",
            get(content::blocks_get).post(content::block_post),
        )
        .route(
            "/api/blocks/:block",
            get(content::block_get)
                .patch(content::block_patch)
                .delete(content::block_delete),
        )
        .route("/api/swap/sections", post(content::sections_swap))
        .route("/api/swap/blocks", post(content::blocks_swap))
}

fn quiz_routes() -> Router<AppState> {
    use protected::quiz;

    Router::new()
        .route("/api/tests/:test", get(quiz::test_get).patch(quiz::test_patch))
        .route(
            "/api/tests/:test/questions",
            get(quiz::questions_get).post(quiz::question_post),
        )
        .route(
            "/api/questions/:question",
            put(quiz::question_put).delete(quiz::question_delete),
        )
        .route("/api/swap/questions", post(quiz::questions_swap))
}

fn session_routes() -> Router<AppState> {
    use protected::sessions;

    Router::new()
        .route("/api/tests/:test/sessions", post(sessions::session_post))
        .route("/api/sessions/:token", get(sessions::session_get))
        .route("/api/sessions/:token/answers", post(sessions::answers_post))
        .route("/api/sessions/:token/finish", post(sessions::finish_post))
}

fn admin_routes() -> Router<AppState> {
    use elevated::{members, sweep, users};

    Router::new()
        .route("/api/admin/users", get(users::users_get))
        .route("/api/admin/users/:user/status", put(users::user_status_put))
        .route("/api/admin/courses/:course/members", post(members::member_post))
        .route(
            "/api/admin/courses/:course/members/:user",
            axum::routing::delete(members::member_delete),
        )
        .route(
            "/api/admin/courses/:course/members/:user/role",
            put(members::member_role_put),
        )
        .route("/api/admin/sweep", post(sweep::sweep_post))
}
