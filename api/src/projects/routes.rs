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
    schema::{comment_likes, comments, projects},
};

use super::models::{NewProject, Project, UpdateProject};

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/", get(list_projects))
        .route("/", post(create_project))
        .route("/{id}", get(get_project))
        .route("/{id}", patch(patch_project))
        .route("/{id}", delete(delete_project))
}

#[axum::debug_handler]
async fn list_projects(State(ctx): State<App>) -> Result<Json<Vec<Project>>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let all = projects::table
        .order(projects::published_at.desc())
        .select(Project::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(all))
}

#[axum::debug_handler]
async fn get_project(
    State(ctx): State<App>,
    Path(id): Path<i32>,
) -> Result<Json<Project>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let found = projects::table
        .filter(projects::id.eq(id))
        .select(Project::as_select())
        .first(&mut conn)
        .await
        .optional()?;

    found
        .map(Json)
        .ok_or(("Project not found", StatusCode::NOT_FOUND).into())
}

#[derive(Deserialize)]
pub struct ProjectSubmission {
    title: String,
    subtitle: Option<String>,
    body: String,
    cover_photo: Option<String>,
}

impl ProjectSubmission {
    fn validate(&mut self) -> Result<(), AppError> {
        self.title = self.title.trim().to_string();

        if self.title.is_empty() || self.body.trim().is_empty() {
            return Err(("Title and body are required", StatusCode::BAD_REQUEST))?;
        }

        Ok(())
    }
}

#[axum::debug_handler]
async fn create_project(
    State(ctx): State<App>,
    SiteOwner(owner): SiteOwner,
    crate::json::Json(mut submission): crate::json::Json<ProjectSubmission>,
) -> Result<Json<Project>, AppError> {
    submission.validate()?;

    let new_project = NewProject {
        title: submission.title,
        subtitle: submission.subtitle,
        body: submission.body,
        cover_photo: submission.cover_photo,
        author_id: Some(owner.id),
        published_at: chrono::Utc::now().naive_utc(),
    };

    let mut conn = ctx.diesel.get().await?;

    let inserted: Project = diesel::insert_into(projects::table)
        .values(&new_project)
        .get_result(&mut conn)
        .await?;

    Ok(Json(inserted))
}

#[derive(Deserialize)]
pub struct ProjectPatch {
    title: Option<String>,
    subtitle: Option<String>,
    body: Option<String>,
    cover_photo: Option<String>,
}

#[axum::debug_handler]
async fn patch_project(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    SiteOwner(_owner): SiteOwner,
    crate::json::Json(patch): crate::json::Json<ProjectPatch>,
) -> Result<Json<Project>, AppError> {
    let changes = UpdateProject {
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

    let updated = diesel::update(projects::table.filter(projects::id.eq(id)))
        .set(&changes)
        .get_result::<Project>(&mut conn)
        .await
        .optional()?;

    updated
        .map(Json)
        .ok_or(("Project not found", StatusCode::NOT_FOUND).into())
}

fn delete_likes_of_project_comments(id: i32) -> impl ExecuteDsl<PooledConn> + QueryFragment<Pg> {
    let comment_ids = comments::table
        .filter(comments::project_id.eq(id))
        .select(comments::id);

    diesel::delete(comment_likes::table.filter(comment_likes::comment_id.eq_any(comment_ids)))
}

fn delete_project_comments(id: i32) -> impl ExecuteDsl<PooledConn> + QueryFragment<Pg> {
    diesel::delete(comments::table.filter(comments::project_id.eq(id)))
}

fn delete_project_row(id: i32) -> impl ExecuteDsl<PooledConn> + QueryFragment<Pg> {
    diesel::delete(projects::table.filter(projects::id.eq(id)))
}

/// Hard delete, cascading over the project's comment forest and its likes.
#[axum::debug_handler]
async fn delete_project(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    SiteOwner(_owner): SiteOwner,
) -> Result<(), AppError> {
    let mut conn = ctx.diesel.get().await?;

    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            delete_likes_of_project_comments(id).execute(conn).await?;

            delete_project_comments(id).execute(conn).await?;

            let deleted = delete_project_row(id).execute(conn).await?;

            if deleted == 0 {
                return Err(("Project not found", StatusCode::NOT_FOUND))?;
            }

            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    tracing::info!(project_id = id, "project and its comments deleted");

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn project_deletion_cascades_over_comments_and_their_likes() {
        let likes = diesel::debug_query::<Pg, _>(&delete_likes_of_project_comments(7)).to_string();
        assert!(likes.starts_with("DELETE"), "{likes}");
        assert!(likes.contains("IN (SELECT"), "{likes}");
        assert!(likes.contains(r#""comments"."project_id""#), "{likes}");

        let forest = diesel::debug_query::<Pg, _>(&delete_project_comments(7)).to_string();
        assert!(forest.contains(r#"DELETE FROM "comments""#), "{forest}");
        assert!(forest.contains(r#""comments"."project_id""#), "{forest}");

        let row = diesel::debug_query::<Pg, _>(&delete_project_row(7)).to_string();
        assert!(row.contains(r#"DELETE FROM "projects""#), "{row}");
    }
}
