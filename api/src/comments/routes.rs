use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::App;

use super::{
    create::{create_post_comment, create_project_comment},
    delete::delete_comment,
    get::{get_post_comments, get_project_comments},
    like::{like_comment, unlike_comment},
};

pub fn route() -> Router<App> {
    // TODO rate limit these public endpoints
    Router::<App>::new()
        .route(
            "/blog/{id}/comments",
            get(get_post_comments).post(create_post_comment),
        )
        .route(
            "/projects/{id}/comments",
            get(get_project_comments).post(create_project_comment),
        )
        .route("/comments/{id}", delete(delete_comment))
        .route("/comments/{id}/like", post(like_comment))
        .route("/comments/{id}/unlike", post(unlike_comment))
}
