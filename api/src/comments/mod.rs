pub mod create;
pub mod delete;
pub mod get;
pub mod like;
pub mod render;
pub mod routes;
pub mod tree;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

/// Sentinel bodies for soft-deleted comments. The row, its likes and its
/// replies all stay in place; only the text is replaced.
pub const DELETED_BY_AUTHOR: &str = "[deleted by author]";
pub const DELETED_BY_ADMIN: &str = "[deleted by admin]";

/// Which content entity a comment forest hangs off of. A comment belongs to
/// exactly one post or one project, never both.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommentHost {
    Post(i32),
    Project(i32),
}

// The model that maps to the database table
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::comments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Comment {
    pub id: i32,
    pub body: String,
    pub author_id: Option<i32>,
    pub post_id: Option<i32>,
    pub project_id: Option<i32>,
    pub parent_id: Option<i32>,

    /// Ordered ancestor ids, root first. Must equal the parent's path with
    /// the parent's id appended; empty for roots. Maintained on insert.
    pub parent_path: Vec<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::comments)]
pub struct NewComment {
    pub body: String,
    pub author_id: Option<i32>,
    pub post_id: Option<i32>,
    pub project_id: Option<i32>,
    pub parent_id: Option<i32>,
    pub parent_path: Vec<i32>,
    pub created_at: NaiveDateTime,
}

/// The flat per-viewer shape the tree builder and renderer consume: the row
/// joined with its author's name and the derived like data.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommentView {
    pub id: i32,
    pub author_id: Option<i32>,

    /// `None` means the author's account was deleted; the renderer shows a
    /// `[deleted]` identity block instead.
    pub author_name: Option<String>,
    pub body: String,
    pub parent_id: Option<i32>,
    pub parent_path: Vec<i32>,
    pub created_at: NaiveDateTime,
    pub likes: i64,
    pub viewer_liked: bool,
}
