use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use diesel::{pg::Pg, prelude::*, query_builder::QueryFragment};
use diesel_async::{AsyncConnection, RunQueryDsl, methods::ExecuteDsl, scoped_futures::ScopedFutureExt};
use serde::Deserialize;

use crate::{
    App, PooledConn,
    error::AppError,
    identity::SiteOwner,
    schema::{comment_likes, comments, posts},
};

use super::models::{NewPost, Post, UpdatePost};

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/", get(list_posts))
        .route("/", post(create_post))
        .route("/{id}", get(get_post))
        .route("/{id}", patch(patch_post))
        .route("/{id}", delete(delete_post))
}

#[axum::debug_handler]
async fn list_posts(State(ctx): State<App>) -> Result<Json<Vec<Post>>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let all = posts::table
        .order(posts::published_at.desc())
        .select(Post::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(all))
}

#[axum::debug_handler]
async fn get_post(
    State(ctx): State<App>,
    Path(id): Path<i32>,
) -> Result<Json<Post>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let found = posts::table
        .filter(posts::id.eq(id))
        .select(Post::as_select())
        .first(&mut conn)
        .await
        .optional()?;

    found
        .map(Json)
        .ok_or(("Post not found", StatusCode::NOT_FOUND).into())
}

#[derive(Deserialize)]
pub struct PostSubmission {
    title: String,
    subtitle: String,
    body: String,
    cover_photo: Option<String>,
}

impl PostSubmission {
    fn validate(&mut self) -> Result<(), AppError> {
        self.title = self.title.trim().to_string();
        self.subtitle = self.subtitle.trim().to_string();

        if self.title.is_empty() || self.subtitle.is_empty() || self.body.trim().is_empty() {
            return Err(("Title, subtitle and body are required", StatusCode::BAD_REQUEST))?;
        }

        Ok(())
    }
}

#[axum::debug_handler]
async fn create_post(
    State(ctx): State<App>,
    SiteOwner(owner): SiteOwner,
    crate::json::Json(mut submission): crate::json::Json<PostSubmission>,
) -> Result<Json<Post>, AppError> {
    submission.validate()?;

    let new_post = NewPost {
        title: submission.title,
        subtitle: submission.subtitle,
        body: submission.body,
        cover_photo: submission.cover_photo,
        author_id: Some(owner.id),
        published_at: chrono::Utc::now().naive_utc(),
    };

    let mut conn = ctx.diesel.get().await?;

    let inserted: Post = diesel::insert_into(posts::table)
        .values(&new_post)
        .get_result(&mut conn)
        .await?;

    Ok(Json(inserted))
}

#[derive(Deserialize)]
pub struct PostPatch {
    title: Option<String>,
    subtitle: Option<String>,
    body: Option<String>,
    cover_photo: Option<String>,
}

#[axum::debug_handler]
async fn patch_post(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    SiteOwner(_owner): SiteOwner,
    crate::json::Json(patch): crate::json::Json<PostPatch>,
) -> Result<Json<Post>, AppError> {
    let changes = UpdatePost {
        title: patch.title,
        subtitle: patch.subtitle,
        body: patch.body,
        cover_photo: patch.cover_photo,
    };

    if changes.title.is_none()
        && changes.subtitle.is_none()
        && changes.body.is_none()
        && changes.cover_photo.is_none()
    {
        return Err(("Nothing to update", StatusCode::BAD_REQUEST))?;
    }

    let mut conn = ctx.diesel.get().await?;

    let updated = diesel::update(posts::table.filter(posts::id.eq(id)))
        .set(&changes)
        .get_result::<Post>(&mut conn)
        .await
        .optional()?;

    updated
        .map(Json)
        .ok_or(("Post not found", StatusCode::NOT_FOUND).into())
}

/// Likes of every comment on the post, found through a subselect so no id
/// list has to round-trip through the application.
fn delete_likes_of_post_comments(id: i32) -> impl ExecuteDsl<PooledConn> + QueryFragment<Pg> {
    let comment_ids = comments::table
        .filter(comments::post_id.eq(id))
        .select(comments::id);

    diesel::delete(comment_likes::table.filter(comment_likes::comment_id.eq_any(comment_ids)))
}

fn delete_post_comments(id: i32) -> impl ExecuteDsl<PooledConn> + QueryFragment<Pg> {
    diesel::delete(comments::table.filter(comments::post_id.eq(id)))
}

fn delete_post_row(id: i32) -> impl ExecuteDsl<PooledConn> + QueryFragment<Pg> {
    diesel::delete(posts::table.filter(posts::id.eq(id)))
}

/// Deleting a post is the one place comments are removed for real: the whole
/// forest and its likes go with the post. Likes first, then comments, then
/// the row itself, all in one transaction.
#[axum::debug_handler]
async fn delete_post(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    SiteOwner(_owner): SiteOwner,
) -> Result<(), AppError> {
    let mut conn = ctx.diesel.get().await?;

    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            delete_likes_of_post_comments(id).execute(conn).await?;

            delete_post_comments(id).execute(conn).await?;

            let deleted = delete_post_row(id).execute(conn).await?;

            if deleted == 0 {
                return Err(("Post not found", StatusCode::NOT_FOUND))?;
            }

            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    tracing::info!(post_id = id, "post and its comments deleted");

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn post_deletion_cascades_over_comments_and_their_likes() {
        let likes = diesel::debug_query::<Pg, _>(&delete_likes_of_post_comments(7)).to_string();
        assert!(likes.starts_with("DELETE"), "{likes}");
        assert!(likes.contains("IN (SELECT"), "{likes}");
        assert!(likes.contains(r#""comments"."post_id""#), "{likes}");

        let forest = diesel::debug_query::<Pg, _>(&delete_post_comments(7)).to_string();
        assert!(forest.contains(r#"DELETE FROM "comments""#), "{forest}");
        assert!(forest.contains(r#""comments"."post_id""#), "{forest}");

        let row = diesel::debug_query::<Pg, _>(&delete_post_row(7)).to_string();
        assert!(row.contains(r#"DELETE FROM "posts""#), "{row}");
    }
}
