use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
};
use axum_extra::extract::{CookieJar, cookie::Cookie};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use diesel_async::{AsyncConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use serde::Deserialize;
use time::Duration;

use crate::{
    App,
    config::Env,
    error::{ApiRequestError, AppError},
    identity::models::{
        session::{SESSION_TTL_DAYS, Session},
        user::{User, UserProfile},
    },
    schema::{comment_likes, comments, posts, projects, sessions, users},
    utils::{render_template, sanitize_filename},
};

use super::{AuthUser, AuthenticationError, COOKIE_NAME};

pub fn route() -> Router<App> {
    // TODO rate limit these public endpoints
    Router::<App>::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(handle_whoami))
        .route("/settings/password", patch(change_password))
        .route("/settings/account", delete(delete_account))
        .route("/settings/avatar", put(upload_avatar))
}

impl ApiRequestError for AuthenticationError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthenticationError::NoCookie => StatusCode::BAD_REQUEST,
            AuthenticationError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthenticationError::NotSiteOwner => StatusCode::FORBIDDEN,
        }
    }
}

const WELCOME_EMAIL_TEMPLATE: &str = "<p>Hi {{name}},</p>\
    <p>Your account is ready. Comments you post, like or reply to are tied \
    to it, and you can delete it at any time from the \
    <a href=\"{{site_url}}/settings\">settings page</a>.</p>";

/// Browsers refuse `Secure` cookies over plain http, which is all a local
/// dev server speaks.
fn session_cookie(token: String, env: Env) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .secure(env != Env::Dev)
        .http_only(true)
        .expires(time::OffsetDateTime::now_utc() + Duration::days(SESSION_TTL_DAYS))
        .path("/")
        .build()
}

fn expired_session_cookie(env: Env) -> Cookie<'static> {
    Cookie::build(COOKIE_NAME)
        .secure(env != Env::Dev)
        .http_only(true)
        .max_age(Duration::ZERO)
        .path("/")
        .build()
}

#[derive(Deserialize)]
pub struct RegisterSubmission {
    name: String,
    email: String,
    password: String,
    password_confirm: String,
}

impl RegisterSubmission {
    fn validate(&mut self) -> Result<(), AppError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(("No name provided", StatusCode::BAD_REQUEST))?;
        }

        if self.name.len() > 50 {
            return Err(("Name too long", StatusCode::BAD_REQUEST))?;
        }

        self.email = self.email.trim().to_lowercase();
        if !self.email.contains('@') || self.email.len() > 128 {
            return Err(("Invalid email", StatusCode::BAD_REQUEST))?;
        }

        if self.password != self.password_confirm {
            return Err(AppError::request(
                "PASSWORDS_DO_NOT_MATCH",
                "Passwords do not match!",
                StatusCode::BAD_REQUEST,
            ));
        }

        if self.password.len() < 8 {
            return Err(AppError::request(
                "PASSWORD_TOO_SHORT",
                "Password must be at least 8 characters",
                StatusCode::BAD_REQUEST,
            ));
        }

        Ok(())
    }
}

/// The users table has a unique index on email, so a duplicate registration
/// surfaces as a unique violation rather than a pre-flight SELECT.
fn map_registration_error(e: diesel::result::Error) -> AppError {
    match e {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::request(
                "EMAIL_TAKEN",
                "Email already registered!",
                StatusCode::CONFLICT,
            )
        }
        e => e.into(),
    }
}

#[axum::debug_handler]
pub async fn register(
    State(ctx): State<App>,
    crate::json::Json(mut submission): crate::json::Json<RegisterSubmission>,
) -> Result<(CookieJar, Json<UserProfile>), AppError> {
    submission.validate()?;

    let new_user = User::new_with_password(
        &submission.name,
        &submission.email,
        &submission.password,
    )?;

    let mut conn = ctx.diesel.get().await?;

    let user: User = diesel::insert_into(users::table)
        .values(&new_user)
        .get_result(&mut conn)
        .await
        .map_err(map_registration_error)?;

    let jar = issue_session(&ctx, user.id).await?;

    if let Some(mailer) = ctx.mailer.as_ref() {
        let body = render_template(
            WELCOME_EMAIL_TEMPLATE,
            &[
                ("{{name}}", user.name.as_str()),
                ("{{site_url}}", &ctx.config.site_url),
            ],
        );
        if let Err(error) = mailer.send(&user.email, "Welcome", &body).await {
            tracing::warn!(?error, user_id = user.id, "could not send the welcome email");
        }
    }

    Ok((jar, Json(UserProfile::from(&user))))
}

#[derive(Deserialize)]
pub struct LoginSubmission {
    email: String,
    password: String,
}

#[axum::debug_handler]
pub async fn login(
    State(ctx): State<App>,
    crate::json::Json(submission): crate::json::Json<LoginSubmission>,
) -> Result<(CookieJar, Json<UserProfile>), AppError> {
    let mut conn = ctx.diesel.get().await?;

    let user = users::table
        .filter(users::email.eq(submission.email.trim().to_lowercase()))
        .select(User::as_select())
        .first::<User>(&mut conn)
        .await
        .optional()?;

    // The same answer whether the email or the password is wrong
    let invalid_credentials = || {
        AppError::request(
            "INVALID_CREDENTIALS",
            "Email or password is invalid.",
            StatusCode::UNAUTHORIZED,
        )
    };

    let user = user.ok_or_else(invalid_credentials)?;

    if !user.verify_password(&submission.password)? {
        return Err(invalid_credentials());
    }

    let jar = issue_session(&ctx, user.id).await?;

    Ok((jar, Json(UserProfile::from(&user))))
}

async fn issue_session(ctx: &App, user_id: i32) -> Result<CookieJar, AppError> {
    let new_session = Session::new_with_user_id(user_id);

    let mut conn = ctx.diesel.get().await?;

    diesel::insert_into(sessions::table)
        .values(&new_session)
        .execute(&mut conn)
        .await?;

    Ok(CookieJar::new().add(session_cookie(new_session.token, ctx.config.env)))
}

#[axum::debug_handler]
pub async fn logout(State(ctx): State<App>, jar: CookieJar) -> Result<CookieJar, AppError> {
    if let Some(cookie) = jar.get(COOKIE_NAME) {
        let mut conn = ctx.diesel.get().await?;

        diesel::update(sessions::table.filter(sessions::token.eq(cookie.value())))
            .set(sessions::active.eq(false))
            .execute(&mut conn)
            .await?;
    }

    Ok(CookieJar::new().add(expired_session_cookie(ctx.config.env)))
}

#[axum::debug_handler(state = App)]
pub async fn handle_whoami(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}

#[derive(Deserialize)]
pub struct ChangePasswordSubmission {
    current_password: String,
    new_password: String,
    confirm_new_password: String,
}

#[axum::debug_handler]
pub async fn change_password(
    State(ctx): State<App>,
    AuthUser(user): AuthUser,
    crate::json::Json(submission): crate::json::Json<ChangePasswordSubmission>,
) -> Result<(), AppError> {
    if !user.verify_password(&submission.current_password)? {
        return Err(AppError::request(
            "WRONG_PASSWORD",
            "Incorrect Current Password",
            StatusCode::FORBIDDEN,
        ));
    }

    if submission.new_password != submission.confirm_new_password {
        return Err(AppError::request(
            "PASSWORDS_DO_NOT_MATCH",
            "New Password Fields Must Match",
            StatusCode::BAD_REQUEST,
        ));
    }

    if submission.new_password.len() < 8 {
        return Err(AppError::request(
            "PASSWORD_TOO_SHORT",
            "Password must be at least 8 characters",
            StatusCode::BAD_REQUEST,
        ));
    }

    let password_hash = bcrypt::hash(&submission.new_password, bcrypt::DEFAULT_COST)?;

    let mut conn = ctx.diesel.get().await?;

    diesel::update(users::table.filter(users::id.eq(user.id)))
        .set((
            users::password_hash.eq(password_hash),
            users::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(&mut conn)
        .await?;

    Ok(())
}

#[derive(Deserialize)]
pub struct DeleteAccountSubmission {
    password: String,
}

/// Removes the account but keeps its comments around as tombstones: the
/// author reference is cleared and the renderer shows a `[deleted]` identity.
#[axum::debug_handler]
pub async fn delete_account(
    State(ctx): State<App>,
    AuthUser(user): AuthUser,
    crate::json::Json(submission): crate::json::Json<DeleteAccountSubmission>,
) -> Result<CookieJar, AppError> {
    if !user.verify_password(&submission.password)? {
        return Err(AppError::request(
            "WRONG_PASSWORD",
            "Incorrect Current Password",
            StatusCode::FORBIDDEN,
        ));
    }

    let mut conn = ctx.diesel.get().await?;

    let user_id = user.id;
    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            diesel::update(comments::table.filter(comments::author_id.eq(user_id)))
                .set(comments::author_id.eq(None::<i32>))
                .execute(conn)
                .await?;

            diesel::update(posts::table.filter(posts::author_id.eq(user_id)))
                .set(posts::author_id.eq(None::<i32>))
                .execute(conn)
                .await?;

            diesel::update(projects::table.filter(projects::author_id.eq(user_id)))
                .set(projects::author_id.eq(None::<i32>))
                .execute(conn)
                .await?;

            diesel::delete(comment_likes::table.filter(comment_likes::user_id.eq(user_id)))
                .execute(conn)
                .await?;

            diesel::delete(sessions::table.filter(sessions::user_id.eq(user_id)))
                .execute(conn)
                .await?;

            diesel::delete(users::table.filter(users::id.eq(user_id)))
                .execute(conn)
                .await?;

            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    tracing::info!(user_id, "account deleted");

    Ok(CookieJar::new().add(expired_session_cookie(ctx.config.env)))
}

const ALLOWED_AVATAR_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

#[axum::debug_handler]
pub async fn upload_avatar(
    State(ctx): State<App>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UserProfile>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.to_string(), StatusCode::BAD_REQUEST))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = sanitize_filename(field.file_name().unwrap_or_default());

        let allowed = filename
            .rsplit_once('.')
            .map(|(stem, ext)| {
                !stem.is_empty() && ALLOWED_AVATAR_EXTENSIONS.contains(&ext.to_lowercase().as_str())
            })
            .unwrap_or(false);

        if !allowed {
            return Err(("Invalid File", StatusCode::BAD_REQUEST))?;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| (e.to_string(), StatusCode::BAD_REQUEST))?;

        let dir = format!("{}/profile_pictures", ctx.config.upload_dir);
        tokio::fs::create_dir_all(&dir).await?;

        let path = format!("{dir}/{filename}");
        tokio::fs::write(&path, &data).await?;

        let mut conn = ctx.diesel.get().await?;

        let updated: User = diesel::update(users::table.filter(users::id.eq(user.id)))
            .set((
                users::profile_picture.eq(&path),
                users::updated_at.eq(chrono::Utc::now().naive_utc()),
            ))
            .get_result(&mut conn)
            .await?;

        return Ok(Json(UserProfile::from(&updated)));
    }

    Err(("No `file` field in upload", StatusCode::BAD_REQUEST))?
}

#[cfg(test)]
mod test {
    use super::*;

    fn submission(password: &str, confirm: &str) -> RegisterSubmission {
        RegisterSubmission {
            name: "Some User".into(),
            email: "user@example.com".into(),
            password: password.into(),
            password_confirm: confirm.into(),
        }
    }

    #[test]
    fn register_rejects_mismatched_passwords() {
        let err = submission("longenough", "different").validate().unwrap_err();
        match err {
            AppError::Request { code, .. } => assert_eq!(code, "PASSWORDS_DO_NOT_MATCH"),
            _ => panic!("expected a request error"),
        }
    }

    #[test]
    fn register_rejects_short_passwords() {
        let err = submission("short", "short").validate().unwrap_err();
        match err {
            AppError::Request { code, .. } => assert_eq!(code, "PASSWORD_TOO_SHORT"),
            _ => panic!("expected a request error"),
        }
    }

    #[test]
    fn register_normalizes_email_and_name() {
        let mut s = submission("longenough", "longenough");
        s.email = " User@Example.COM ".into();
        s.validate().unwrap();
        assert_eq!(s.email, "user@example.com");
    }

    #[test]
    fn duplicate_email_maps_to_email_taken() {
        let e = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("users_email_key".to_string()),
        );
        match map_registration_error(e) {
            AppError::Request { code, status, .. } => {
                assert_eq!(code, "EMAIL_TAKEN");
                assert_eq!(status, StatusCode::CONFLICT);
            }
            _ => panic!("expected a request error"),
        }
    }

    #[test]
    fn dev_session_cookies_skip_the_secure_flag() {
        assert_eq!(session_cookie("t".into(), Env::Dev).secure(), Some(false));
        assert_eq!(
            session_cookie("t".into(), Env::Production).secure(),
            Some(true)
        );
        assert_eq!(expired_session_cookie(Env::Dev).secure(), Some(false));
        assert_eq!(expired_session_cookie(Env::Production).secure(), Some(true));
    }

    #[test]
    fn welcome_email_links_to_the_settings_page() {
        let body = render_template(
            WELCOME_EMAIL_TEMPLATE,
            &[
                ("{{name}}", "Ana"),
                ("{{site_url}}", "https://example.com"),
            ],
        );
        assert!(body.contains("Hi Ana"));
        assert!(body.contains("https://example.com/settings"));
    }

    #[test]
    fn other_database_errors_stay_server_errors() {
        match map_registration_error(diesel::result::Error::NotFound) {
            AppError::Server { .. } => {}
            _ => panic!("expected a server error"),
        }
    }
}
