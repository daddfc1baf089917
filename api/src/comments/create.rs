use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use crate::{
    App,
    error::AppError,
    identity::AuthUser,
    identity::models::user::User,
    schema::{comments, posts, projects},
};

use super::{Comment, CommentHost, CommentView, NewComment};

#[derive(Deserialize)]
pub struct CommentSubmission {
    body: String,
    parent_id: Option<i32>,
}

impl CommentSubmission {
    fn validate(&mut self) -> Result<(), &'static str> {
        self.body = self.body.trim().to_string();

        if self.body.chars().count() > 5000 {
            return Err("Content too long (max 5000 characters)");
        }

        if self.body.is_empty() {
            return Err("No content provided");
        }

        Ok(())
    }
}

#[debug_handler]
pub async fn create_post_comment(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AuthUser(auth_user): AuthUser,
    crate::json::Json(submission): crate::json::Json<CommentSubmission>,
) -> Result<Json<CommentView>, AppError> {
    create_comment(&ctx, CommentHost::Post(id), auth_user, submission).await
}

#[debug_handler]
pub async fn create_project_comment(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AuthUser(auth_user): AuthUser,
    crate::json::Json(submission): crate::json::Json<CommentSubmission>,
) -> Result<Json<CommentView>, AppError> {
    create_comment(&ctx, CommentHost::Project(id), auth_user, submission).await
}

async fn create_comment(
    ctx: &App,
    host: CommentHost,
    auth_user: User,
    mut submission: CommentSubmission,
) -> Result<Json<CommentView>, AppError> {
    submission
        .validate()
        .map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    let mut conn = ctx.diesel.get().await?;

    match host {
        CommentHost::Post(id) => {
            let exists = posts::table
                .filter(posts::id.eq(id))
                .select(posts::id)
                .first::<i32>(&mut conn)
                .await
                .optional()?;
            if exists.is_none() {
                return Err(("Post not found", StatusCode::NOT_FOUND))?;
            }
        }
        CommentHost::Project(id) => {
            let exists = projects::table
                .filter(projects::id.eq(id))
                .select(projects::id)
                .first::<i32>(&mut conn)
                .await
                .optional()?;
            if exists.is_none() {
                return Err(("Project not found", StatusCode::NOT_FOUND))?;
            }
        }
    }

    // For replies, the parent must live on the same post/project, and the
    // materialized path is extended with the parent's id
    let parent_path = match submission.parent_id {
        None => Vec::new(),
        Some(parent_id) => {
            let parent = comments::table
                .filter(comments::id.eq(parent_id))
                .select(Comment::as_select())
                .first::<Comment>(&mut conn)
                .await
                .optional()?;

            let parent = match parent {
                Some(p) => p,
                None => {
                    return Err((
                        "You're replying to a comment that does not exist",
                        StatusCode::BAD_REQUEST,
                    ))?;
                }
            };

            let same_host = match host {
                CommentHost::Post(id) => parent.post_id == Some(id),
                CommentHost::Project(id) => parent.project_id == Some(id),
            };

            if !same_host {
                return Err((
                    "You're replying to a comment that does not belong to this page",
                    StatusCode::BAD_REQUEST,
                ))?;
            }

            let mut path = parent.parent_path;
            path.push(parent.id);
            path
        }
    };

    let new_comment = NewComment {
        body: submission.body,
        author_id: Some(auth_user.id),
        post_id: match host {
            CommentHost::Post(id) => Some(id),
            CommentHost::Project(_) => None,
        },
        project_id: match host {
            CommentHost::Post(_) => None,
            CommentHost::Project(id) => Some(id),
        },
        parent_id: submission.parent_id,
        parent_path,
        created_at: chrono::Utc::now().naive_utc(),
    };

    let inserted: Comment = diesel::insert_into(comments::table)
        .values(&new_comment)
        .get_result(&mut conn)
        .await?;

    Ok(Json(CommentView {
        id: inserted.id,
        author_id: inserted.author_id,
        author_name: Some(auth_user.name),
        body: inserted.body,
        parent_id: inserted.parent_id,
        parent_path: inserted.parent_path,
        created_at: inserted.created_at,
        likes: 0,
        viewer_liked: false,
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validate_trims_and_rejects_empty_bodies() {
        let mut s = CommentSubmission {
            body: "   \n  ".into(),
            parent_id: None,
        };
        assert_eq!(s.validate(), Err("No content provided"));

        let mut s = CommentSubmission {
            body: "  fine  ".into(),
            parent_id: None,
        };
        s.validate().unwrap();
        assert_eq!(s.body, "fine");
    }

    #[test]
    fn validate_rejects_oversized_bodies() {
        let mut s = CommentSubmission {
            body: "x".repeat(5001),
            parent_id: None,
        };
        assert_eq!(s.validate(), Err("Content too long (max 5000 characters)"));
    }

    #[test]
    fn validate_counts_characters_not_bytes() {
        // 5000 two-byte characters must pass the limit
        let mut s = CommentSubmission {
            body: "é".repeat(5000),
            parent_id: None,
        };
        s.validate().unwrap();

        let mut s = CommentSubmission {
            body: "é".repeat(5001),
            parent_id: None,
        };
        assert_eq!(s.validate(), Err("Content too long (max 5000 characters)"));
    }
}
