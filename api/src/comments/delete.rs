use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::{App, error::AppError, identity::AuthUser, schema::comments};

use super::{Comment, DELETED_BY_ADMIN, DELETED_BY_AUTHOR};

/// Soft delete: the body is swapped for a sentinel that records who removed
/// it. The row, its likes and its reply subtree all stay, so replies to a
/// deleted comment remain visible and attached.
#[debug_handler]
pub async fn delete_comment(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    AuthUser(auth_user): AuthUser,
) -> Result<(), AppError> {
    let mut conn = ctx.diesel.get().await?;

    let comment = comments::table
        .filter(comments::id.eq(id))
        .select(Comment::as_select())
        .first::<Comment>(&mut conn)
        .await
        .optional()?;

    let comment = match comment {
        Some(c) => c,
        None => return Err(("Comment not found", StatusCode::NOT_FOUND))?,
    };

    let sentinel = match sentinel_for(comment.author_id, auth_user.id, ctx.config.owner_user_id) {
        Some(s) => s,
        None => {
            return Err((
                "You are not the owner of this comment",
                StatusCode::FORBIDDEN,
            ))?;
        }
    };

    diesel::update(comments::table.filter(comments::id.eq(id)))
        .set(comments::body.eq(sentinel))
        .execute(&mut conn)
        .await?;

    tracing::info!(comment_id = id, sentinel, "comment soft-deleted");

    Ok(())
}

/// Which sentinel body replaces the comment, or `None` when the actor may not
/// delete it. The site owner removing their own comment counts as an author
/// deletion.
fn sentinel_for(author_id: Option<i32>, actor_id: i32, owner_user_id: i32) -> Option<&'static str> {
    if author_id == Some(actor_id) {
        Some(DELETED_BY_AUTHOR)
    } else if actor_id == owner_user_id {
        Some(DELETED_BY_ADMIN)
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn author_deletion_uses_the_author_sentinel() {
        assert_eq!(sentinel_for(Some(7), 7, 1), Some(DELETED_BY_AUTHOR));
        // The owner's own comment is still an author deletion
        assert_eq!(sentinel_for(Some(1), 1, 1), Some(DELETED_BY_AUTHOR));
    }

    #[test]
    fn owner_deletion_of_another_comment_uses_the_admin_sentinel() {
        assert_eq!(sentinel_for(Some(7), 1, 1), Some(DELETED_BY_ADMIN));
        // Tombstoned author, only the owner may still moderate
        assert_eq!(sentinel_for(None, 1, 1), Some(DELETED_BY_ADMIN));
    }

    #[test]
    fn unrelated_accounts_may_not_delete() {
        assert_eq!(sentinel_for(Some(7), 8, 1), None);
        assert_eq!(sentinel_for(None, 8, 1), None);
    }
}
