//! Account registration.

use crate::middleware::ClientCtx;
use crate::session;
use crate::template::CreateUserTemplate;
use crate::user;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::TemplateToResponse;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use validator::{Validate, ValidationError};

#[derive(Deserialize, Validate)]
pub struct FormData {
    #[validate(
        length(min = 3, max = 50),
        custom = "validate_username_characters"
    )]
    username: String,
    #[validate(email, length(max = 100))]
    email: String,
    #[validate(length(min = 8, max = 255))]
    password: String,
    password_confirm: String,
}

fn validate_username_characters(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(ValidationError::new("username_characters"))
    }
}

fn field_messages(errors: &validator::ValidationErrors) -> Vec<String> {
    let mut messages = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for e in field_errors {
            messages.push(match (field, e.code.as_ref()) {
                ("username", "username_characters") => {
                    "Username can only contain letters, numbers, and underscores.".to_owned()
                }
                ("username", _) => "Username must be 3 to 50 characters long.".to_owned(),
                ("email", _) => "Please enter a valid email address (max 100 characters).".to_owned(),
                ("password", _) => "Password must be 8 to 255 characters long.".to_owned(),
                _ => "Invalid input.".to_owned(),
            });
        }
    }
    messages
}

#[get("/register")]
pub async fn create_user_get(client: ClientCtx) -> impl Responder {
    CreateUserTemplate {
        client,
        errors: Vec::new(),
        username: String::new(),
        email: String::new(),
    }
    .to_response()
}

#[post("/register")]
pub async fn create_user_post(
    client: ClientCtx,
    cookies: actix_session::Session,
    db: web::Data<DatabaseConnection>,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    let mut errors = match form.validate() {
        Ok(()) => Vec::new(),
        Err(e) => field_messages(&e),
    };

    if form.password != form.password_confirm {
        errors.push("Passwords do not match.".to_owned());
    }

    // Uniqueness checks only once the fields themselves are sound.
    if errors.is_empty() {
        if user::username_taken(&db, &form.username)
            .await
            .map_err(|e| {
                log::error!("registration username check: {}", e);
                error::ErrorInternalServerError("Internal error.")
            })?
        {
            errors.push("Username is already taken. Please choose a different one.".to_owned());
        }
        if user::email_taken(&db, &form.email).await.map_err(|e| {
            log::error!("registration email check: {}", e);
            error::ErrorInternalServerError("Internal error.")
        })? {
            errors.push("Email is already registered. Please log in instead.".to_owned());
        }
    }

    if !errors.is_empty() {
        return Ok(CreateUserTemplate {
            client,
            errors,
            username: form.username.clone(),
            email: form.email.clone(),
        }
        .to_response());
    }

    let hash = session::hash_password(&form.password).map_err(|e| {
        log::error!("password hashing failed: {}", e);
        error::ErrorInternalServerError("Internal error.")
    })?;

    let new_user = user::insert_new_user(&db, &form.username, &form.email, &hash)
        .await
        .map_err(|e| {
            log::error!("registration insert: {}", e);
            error::ErrorInternalServerError("Internal error.")
        })?;

    session::log_in(&cookies, new_user.id)?;
    log::info!("new user registered: {} (id={})", new_user.username, new_user.id);

    Ok(HttpResponse::Found()
        .append_header(("Location", "/"))
        .finish())
}
