use crate::middleware::ClientCtx;
use crate::session;
use crate::user;
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(post_login).service(view_login);
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub client: ClientCtx,
    pub error: Option<String>,
    pub username: String,
}

#[derive(Deserialize)]
pub struct FormData {
    username: String,
    password: String,
}

#[get("/login")]
pub async fn view_login(client: ClientCtx) -> Result<impl Responder, Error> {
    Ok(LoginTemplate {
        client,
        error: None,
        username: String::new(),
    }
    .to_response())
}

#[post("/login")]
pub async fn post_login(
    client: ClientCtx,
    cookies: actix_session::Session,
    db: web::Data<DatabaseConnection>,
    form: web::Form<FormData>,
) -> Result<HttpResponse, Error> {
    let user = user::get_by_username(&db, form.username.trim())
        .await
        .map_err(|e| {
            log::error!("login lookup failed: {}", e);
            error::ErrorInternalServerError("Internal error.")
        })?;

    // One generic message for both failures to avoid username enumeration.
    let user = match user {
        Some(user) if session::verify_password(&user.password, &form.password) => user,
        _ => {
            log::debug!("login failure for {}", form.username);
            return Ok(LoginTemplate {
                client,
                error: Some("Invalid username or password.".to_owned()),
                username: form.username.clone(),
            }
            .to_response());
        }
    };

    session::log_in(&cookies, user.id)?;
    log::info!("user {} logged in", user.id);

    Ok(HttpResponse::Found()
        .append_header(("Location", "/"))
        .finish())
}
