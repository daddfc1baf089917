use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use crate::{
    App,
    error::AppError,
    identity::MaybeAuthUser,
    schema::{comment_likes, comments, posts, projects, users},
};

use super::{
    Comment, CommentHost, CommentView,
    render::{RenderOptions, render_forest},
    tree::{build_forest, verify_parent_paths},
};

#[derive(Deserialize)]
pub struct Queries {
    format: Option<Format>,
}

#[derive(PartialEq)]
enum Format {
    Html,
    Json,
}

impl<'de> Deserialize<'de> for Format {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match String::deserialize(deserializer)?.as_str() {
            "html" => Ok(Format::Html),
            "json" => Ok(Format::Json),
            _ => Err(serde::de::Error::custom("invalid format")),
        }
    }
}

#[axum::debug_handler]
pub async fn get_post_comments(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    q: Query<Queries>,
    MaybeAuthUser(auth_user): MaybeAuthUser,
) -> Result<Response, AppError> {
    let viewer_id = auth_user.ok().map(|u| u.id);
    let flat = fetch_comment_views(&ctx, CommentHost::Post(id), viewer_id).await?;
    respond(&ctx, flat, &q.0, viewer_id)
}

#[axum::debug_handler]
pub async fn get_project_comments(
    State(ctx): State<App>,
    Path(id): Path<i32>,
    q: Query<Queries>,
    MaybeAuthUser(auth_user): MaybeAuthUser,
) -> Result<Response, AppError> {
    let viewer_id = auth_user.ok().map(|u| u.id);
    let flat = fetch_comment_views(&ctx, CommentHost::Project(id), viewer_id).await?;
    respond(&ctx, flat, &q.0, viewer_id)
}

fn respond(
    ctx: &App,
    flat: Vec<CommentView>,
    q: &Queries,
    viewer_id: Option<i32>,
) -> Result<Response, AppError> {
    if let Err(violation) = verify_parent_paths(&flat) {
        // Descendant lookups will under- or over-report until this is fixed
        // in the data; the page still renders.
        tracing::error!(%violation, "materialized parent_path is out of sync");
    }

    let forest = build_forest(flat.clone());

    match q.format.as_ref().unwrap_or(&Format::Html) {
        Format::Json => Ok(Json(forest).into_response()),
        Format::Html => {
            let opts = RenderOptions {
                viewer_id,
                owner_user_id: ctx.config.owner_user_id,
            };
            Ok(Html(render_forest(&forest, &flat, &opts)).into_response())
        }
    }
}

/// Loads the flat comment set of one post or project together with author
/// names and the derived like data. Like counters are always counted from
/// the join table, so they cannot drift from the per-user liked set.
pub async fn fetch_comment_views(
    ctx: &App,
    host: CommentHost,
    viewer_id: Option<i32>,
) -> Result<Vec<CommentView>, AppError> {
    let mut conn = ctx.diesel.get().await?;

    let rows: Vec<(Comment, Option<String>)> = match host {
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

            comments::table
                .left_join(users::table)
                .filter(comments::post_id.eq(id))
                .order((comments::created_at.asc(), comments::id.asc()))
                .select((Comment::as_select(), users::name.nullable()))
                .load(&mut conn)
                .await?
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

            comments::table
                .left_join(users::table)
                .filter(comments::project_id.eq(id))
                .order((comments::created_at.asc(), comments::id.asc()))
                .select((Comment::as_select(), users::name.nullable()))
                .load(&mut conn)
                .await?
        }
    };

    let ids: Vec<i32> = rows.iter().map(|(c, _)| c.id).collect();

    let like_counts: HashMap<i32, i64> = comment_likes::table
        .filter(comment_likes::comment_id.eq_any(&ids))
        .group_by(comment_likes::comment_id)
        .select((comment_likes::comment_id, diesel::dsl::count_star()))
        .load::<(i32, i64)>(&mut conn)
        .await?
        .into_iter()
        .collect();

    let viewer_liked: HashSet<i32> = match viewer_id {
        Some(viewer) => comment_likes::table
            .filter(comment_likes::comment_id.eq_any(&ids))
            .filter(comment_likes::user_id.eq(viewer))
            .select(comment_likes::comment_id)
            .load::<i32>(&mut conn)
            .await?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    Ok(rows
        .into_iter()
        .map(|(c, author_name)| CommentView {
            likes: like_counts.get(&c.id).copied().unwrap_or(0),
            viewer_liked: viewer_liked.contains(&c.id),
            id: c.id,
            author_id: c.author_id,
            author_name,
            body: c.body,
            parent_id: c.parent_id,
            parent_path: c.parent_path,
            created_at: c.created_at,
        })
        .collect())
}
