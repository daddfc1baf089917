use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use diesel::{pg::Pg, prelude::*, query_builder::QueryFragment};
use diesel_async::{
    RunQueryDsl,
    methods::{ExecuteDsl, LoadQuery},
};
use serde::Serialize;

use crate::{
    App, PooledConn, error::AppError, identity::AuthUser, schema::comment_likes, schema::comments,
};

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::comment_likes)]
struct NewCommentLike {
    comment_id: i32,
    user_id: i32,
    created_at: chrono::NaiveDateTime,
}

#[derive(Serialize)]
pub struct LikeResponse {
    comment_id: i32,
    likes: i64,
    viewer_liked: bool,
}

/// Insert that is absorbed by the unique (comment_id, user_id) index when the
/// viewer already liked the comment, making a repeated like a no-op.
fn like_upsert(like: NewCommentLike) -> impl ExecuteDsl<PooledConn> + QueryFragment<Pg> {
    diesel::insert_into(comment_likes::table)
        .values(like)
        .on_conflict((comment_likes::comment_id, comment_likes::user_id))
        .do_nothing()
}

/// Removes only the viewer's own row; unliking something never liked deletes
/// nothing.
fn unlike_delete(comment_id: i32, user_id: i32) -> impl ExecuteDsl<PooledConn> + QueryFragment<Pg> {
    diesel::delete(
        comment_likes::table
            .filter(comment_likes::comment_id.eq(comment_id))
            .filter(comment_likes::user_id.eq(user_id)),
    )
}

/// The counter is always counted from the join table, never stored, so it
/// cannot drift from the per-user rows.
fn likes_count_query(
    comment_id: i32,
) -> impl LoadQuery<'static, PooledConn, i64> + QueryFragment<Pg> {
    comment_likes::table
        .filter(comment_likes::comment_id.eq(comment_id))
        .count()
}

#[debug_handler]
pub async fn like_comment(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AuthUser(auth_user): AuthUser,
) -> Result<Json<LikeResponse>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    ensure_comment_exists(&mut conn, id).await?;

    like_upsert(NewCommentLike {
        comment_id: id,
        user_id: auth_user.id,
        created_at: chrono::Utc::now().naive_utc(),
    })
    .execute(&mut conn)
    .await?;

    Ok(Json(LikeResponse {
        comment_id: id,
        likes: count_likes(&mut conn, id).await?,
        viewer_liked: true,
    }))
}

#[debug_handler]
pub async fn unlike_comment(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AuthUser(auth_user): AuthUser,
) -> Result<Json<LikeResponse>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    ensure_comment_exists(&mut conn, id).await?;

    unlike_delete(id, auth_user.id).execute(&mut conn).await?;

    Ok(Json(LikeResponse {
        comment_id: id,
        likes: count_likes(&mut conn, id).await?,
        viewer_liked: false,
    }))
}

async fn ensure_comment_exists(conn: &mut PooledConn, id: i32) -> Result<(), AppError> {
    let exists = comments::table
        .filter(comments::id.eq(id))
        .select(comments::id)
        .first::<i32>(conn)
        .await
        .optional()?;

    if exists.is_none() {
        return Err(("Comment not found", StatusCode::NOT_FOUND))?;
    }

    Ok(())
}

async fn count_likes(conn: &mut PooledConn, id: i32) -> Result<i64, AppError> {
    Ok(likes_count_query(id).get_result(conn).await?)
}

#[cfg(test)]
mod test {
    use super::*;

    fn like(comment_id: i32, user_id: i32) -> NewCommentLike {
        NewCommentLike {
            comment_id,
            user_id,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn liking_twice_is_absorbed_by_the_unique_pair() {
        let sql = diesel::debug_query::<Pg, _>(&like_upsert(like(1, 2))).to_string();
        assert!(sql.contains("ON CONFLICT"), "{sql}");
        assert!(sql.contains("DO NOTHING"), "{sql}");
    }

    #[test]
    fn unliking_only_removes_the_viewers_row() {
        let sql = diesel::debug_query::<Pg, _>(&unlike_delete(1, 2)).to_string();
        assert!(sql.starts_with("DELETE"), "{sql}");
        assert!(sql.contains(r#""comment_likes"."comment_id""#), "{sql}");
        assert!(sql.contains(r#""comment_likes"."user_id""#), "{sql}");
    }

    // Like-then-unlike restores both membership (the viewer's row is gone
    // again) and the counter, because the counter is derived rather than
    // incremented.
    #[test]
    fn the_counter_is_derived_from_the_join_table() {
        let sql = diesel::debug_query::<Pg, _>(&likes_count_query(1)).to_string();
        assert!(sql.contains("COUNT"), "{sql}");
        assert!(sql.contains(r#""comment_likes"."comment_id""#), "{sql}");
        assert!(!sql.contains("UPDATE"), "{sql}");
    }
}
