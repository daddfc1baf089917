use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = crate::schema::posts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub cover_photo: Option<String>,
    pub author_id: Option<i32>,
    pub published_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::posts)]
pub struct NewPost {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub cover_photo: Option<String>,
    pub author_id: Option<i32>,
    pub published_at: NaiveDateTime,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::posts)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body: Option<String>,
    pub cover_photo: Option<String>,
}
