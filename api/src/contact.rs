use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::{
    App,
    error::AppError,
    utils::{escape_html, render_template},
};

const CONTACT_EMAIL_TEMPLATE: &str = "<p>Name: {{name}}</p>\
    <p>Email: {{email}}</p>\
    <p>Message: {{message}}</p>";

#[derive(Deserialize)]
pub struct ContactSubmission {
    name: String,
    email: String,
    message: String,
}

#[derive(Serialize)]
pub struct ContactResponse {
    sent: bool,
}

#[axum::debug_handler]
pub async fn contact(
    State(ctx): State<App>,
    crate::json::Json(submission): crate::json::Json<ContactSubmission>,
) -> Result<Json<ContactResponse>, AppError> {
    let name = submission.name.trim();
    let email = submission.email.trim();

    if name.is_empty() || email.is_empty() {
        return Err(("Name and email are required", StatusCode::BAD_REQUEST))?;
    }

    let mailer = ctx.mailer.as_ref().ok_or((
        "Contact form is not configured",
        StatusCode::SERVICE_UNAVAILABLE,
    ))?;

    let body = render_template(
        CONTACT_EMAIL_TEMPLATE,
        &[
            ("{{name}}", &escape_html(name)),
            ("{{email}}", &escape_html(email)),
            ("{{message}}", &escape_html(submission.message.trim())),
        ],
    );

    mailer
        .send(mailer.contact_recipient(), "Website contact", &body)
        .await?;

    tracing::info!("contact form notification sent");

    Ok(Json(ContactResponse { sent: true }))
}
