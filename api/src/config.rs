#[derive(Clone, Copy, PartialEq)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

pub struct ServerConfig {
    pub env: Env,
    pub database_url: String,
    pub port: u16,
    pub site_url: String,

    /// The one account allowed to manage posts/projects and moderate
    /// other people's comments.
    pub owner_user_id: i32,

    pub upload_dir: String,
    pub mail: Option<MailConfig>,
}

/// Credentials for the transactional email HTTP API. Either all variables
/// are set or the mail integration is disabled.
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
    pub contact_recipient: String,
}

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(e) => match e {
            std::env::VarError::NotPresent => Ok(None),
            std::env::VarError::NotUnicode(_) => Err(format!(
                "Could not get the environment variable `{key}` due to unicode error"
            )),
        },
    }
}

fn required_var(key: &str) -> String {
    let val = var(key);
    match val {
        Ok(val) => match val {
            Some(val) => val,
            None => {
                tracing::error!("Environment variable `{key}` is required");
                std::process::exit(1)
            }
        },
        Err(e) => {
            tracing::error!(
                "Environment variable `{key}` is required, but could not retrieve: {e}"
            );
            std::process::exit(1)
        }
    }
}

/// Either all or none variables are set
fn all_or_none_vars(keys: Vec<&str>) -> Option<Vec<String>> {
    keys.iter().fold(None, |accum, k| match var(k) {
        Ok(Some(val)) => match accum {
            Some(mut l) => {
                l.push(val);
                Some(l)
            }
            None => Some(vec![val]),
        },
        _ => match accum {
            Some(_) => {
                tracing::error!(
                    "Environment variable `{k}` is required if variables {keys:?} are present"
                );
                None
            }
            None => None,
        },
    })
}

impl ServerConfig {
    pub fn new_from_env() -> Self {
        let mail = all_or_none_vars(vec![
            "MAIL_API_URL",
            "MAIL_API_KEY",
            "MAIL_FROM",
            "CONTACT_RECIPIENT",
        ])
        .map(|mut vars| MailConfig {
            api_url: vars.remove(0),
            api_key: vars.remove(0),
            from: vars.remove(0),
            contact_recipient: vars.remove(0),
        });

        if mail.is_none() {
            tracing::warn!("Mail API variables are not set, outbound email is disabled");
        }

        let owner_user_id = match required_var("OWNER_USER_ID").parse() {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Environment variable `OWNER_USER_ID` is not an integer: {e}");
                std::process::exit(1)
            }
        };

        ServerConfig {
            env: match var("ENVIRONMENT") {
                Ok(Some(env)) => match env.as_str() {
                    "dev" => Env::Dev,
                    "staging" => Env::Staging,
                    "production" => Env::Production,
                    _ => Env::Dev,
                },
                _ => Env::Dev,
            },
            database_url: required_var("DATABASE_URL"),
            port: var("PORT")
                .ok()
                .flatten()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            site_url: var("SITE_URL")
                .ok()
                .flatten()
                .unwrap_or_else(|| "http://localhost:3000".into()),
            owner_user_id,
            upload_dir: var("UPLOAD_DIR")
                .ok()
                .flatten()
                .unwrap_or_else(|| "static/uploads".into()),
            mail,
        }
    }
}
