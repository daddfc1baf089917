use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Identifiable, AsChangeset, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    /// TODO this function should be ran inside spawn_blocking
    pub fn new_with_password(
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<NewUser, bcrypt::BcryptError> {
        let now = chrono::Utc::now().naive_utc();
        Ok(NewUser {
            email: email.trim().to_lowercase(),
            password_hash: bcrypt::hash(password, bcrypt::DEFAULT_COST)?,
            // Display names double as URL path segments on profile pages
            name: name.trim().replace(' ', "_"),
            profile_picture: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn verify_password(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        bcrypt::verify(password, &self.password_hash)
    }
}

/// What the client gets to see about an account. Never exposes the hash.
#[derive(Serialize, Debug)]
pub struct UserProfile {
    pub id: i32,
    pub name: String,
    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        UserProfile {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            profile_picture: u.profile_picture.clone(),
        }
    }
}
