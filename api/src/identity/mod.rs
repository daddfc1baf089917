use axum::{extract::FromRequestParts, http::request::Parts};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::{
    App,
    error::{ApiRequestError, AppError},
    schema::{sessions, users},
};

use self::models::user::User;

pub mod models;
pub mod routes;

pub const COOKIE_NAME: &str = "auth_token";

#[derive(thiserror::Error, Debug)]
pub enum AuthenticationError {
    #[error("Authentication required, but no cookie `{COOKIE_NAME}` found in headers.")]
    NoCookie,

    #[error(
        "Unauthorized, please check if you're logged in by refreshing the \
         page. This could be due to an expired session or token has became invalid."
    )]
    Unauthorized,

    #[error("This action is reserved for the site owner.")]
    NotSiteOwner,
}

impl From<AuthenticationError> for AppError {
    fn from(e: AuthenticationError) -> Self {
        AppError::request(e.code(), e.to_string(), e.status_code())
    }
}

pub struct MaybeAuthUser(pub Result<User, AuthenticationError>);

impl FromRequestParts<App> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let jar = axum_extra::extract::cookie::CookieJar::from_headers(&parts.headers);

        // TODO implement and use an additional shorter cookie length and expiry
        // a.k.a. session token which will be cleared on browser close. This helps
        // speed up the auth process by comparing a shorter token instead of the
        // longer one. The longer one will be used to refresh the shorter one thus
        // has a longer expiry.
        let session_token: String = if let Some(t) = jar.get(COOKIE_NAME) {
            t.value().to_owned()
        } else {
            return Ok(MaybeAuthUser(Err(AuthenticationError::NoCookie)));
        };

        let mut conn = state.diesel.get().await?;
        let now = chrono::Utc::now().naive_utc();

        let user = sessions::table
            .inner_join(users::table)
            .filter(sessions::token.eq(session_token))
            .filter(sessions::active.eq(true))
            .filter(sessions::expires_at.gt(now))
            .filter(sessions::issued_at.le(now))
            .select(User::as_select())
            .first::<User>(&mut conn)
            .await
            .optional()?;

        Ok(MaybeAuthUser(
            user.ok_or(AuthenticationError::Unauthorized),
        ))
    }
}

pub struct AuthUser(pub User);

impl FromRequestParts<App> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let MaybeAuthUser(auth_user) = MaybeAuthUser::from_request_parts(parts, state).await?;

        Ok(AuthUser(auth_user?))
    }
}

/// Like [`AuthUser`] but additionally requires the authenticated account to
/// be the configured site owner.
pub struct SiteOwner(pub User);

impl FromRequestParts<App> for SiteOwner {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;

        if user.id != state.config.owner_user_id {
            return Err(AuthenticationError::NotSiteOwner.into());
        }

        Ok(SiteOwner(user))
    }
}
