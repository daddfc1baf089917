use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Identifiable, Debug, Serialize, Clone)]
#[diesel(table_name = crate::schema::projects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Project {
    pub id: i32,
    pub title: String,
    pub subtitle: Option<String>,
    pub body: String,
    pub cover_photo: Option<String>,
    pub author_id: Option<i32>,
    pub published_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::projects)]
pub struct NewProject {
    pub title: String,
    pub subtitle: Option<String>,
    pub body: String,
    pub cover_photo: Option<String>,
    pub author_id: Option<i32>,
    pub published_at: NaiveDateTime,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::projects)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub body: Option<String>,
    pub cover_photo: Option<String>,
}
