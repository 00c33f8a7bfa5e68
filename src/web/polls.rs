//! Poll management endpoints: create, edit, delete.

use crate::middleware::ClientCtx;
use crate::orm::{comments, polls, votes};
use crate::poll::{self, OptionWithVotes, PollError, PollForm};
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(create_poll_form)
        .service(create_poll_post)
        .service(edit_poll_form)
        .service(edit_poll_post)
        .service(delete_poll_form)
        .service(delete_poll_post);
}

#[derive(Deserialize)]
pub struct PollFormData {
    pub csrf_token: String,
    pub title: String,
    pub description: Option<String>,
    pub end_time: Option<String>,
    /// One option per line, as typed into the textarea.
    #[serde(default)]
    pub options: String,
}

/// Parse the raw form into a `PollForm`, reporting an unparseable end time
/// alongside whatever field validation will find.
fn parse_poll_form(data: &PollFormData) -> (PollForm, Vec<String>) {
    let mut parse_errors = Vec::new();

    let end_time = match data.end_time.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            // datetime-local inputs submit with or without seconds.
            match chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
            {
                Ok(t) => Some(t),
                Err(_) => {
                    parse_errors.push("Invalid end time format.".to_owned());
                    None
                }
            }
        }
    };

    (
        PollForm {
            title: data.title.clone(),
            description: data.description.clone(),
            end_time,
            options: data.options.lines().map(str::to_owned).collect(),
        },
        parse_errors,
    )
}

fn map_poll_error(e: PollError) -> Error {
    match e {
        PollError::NotFound => error::ErrorNotFound("Poll not found."),
        PollError::Forbidden => error::ErrorForbidden("Only the poll creator may do this."),
        PollError::Db(e) => {
            log::error!("poll operation failed: {}", e);
            error::ErrorInternalServerError("Internal error.")
        }
        // Validation problems are rendered back into the form, not mapped.
        other => error::ErrorBadRequest(other.to_string()),
    }
}

#[derive(Template)]
#[template(path = "poll_create.html")]
pub struct PollCreateTemplate {
    pub client: ClientCtx,
    pub errors: Vec<String>,
    pub title: String,
    pub description: String,
    pub end_time: String,
    /// Prefill for the options textarea, one option per line.
    pub options_text: String,
}

impl PollCreateTemplate {
    fn blank(client: ClientCtx) -> Self {
        Self {
            client,
            errors: Vec::new(),
            title: String::new(),
            description: String::new(),
            end_time: String::new(),
            options_text: String::new(),
        }
    }
}

#[get("/polls/create")]
pub async fn create_poll_form(client: ClientCtx) -> Result<impl Responder, Error> {
    client.require_login()?;
    Ok(PollCreateTemplate::blank(client).to_response())
}

#[post("/polls/create")]
pub async fn create_poll_post(
    client: ClientCtx,
    cookies: actix_session::Session,
    db: web::Data<DatabaseConnection>,
    form: web::Form<PollFormData>,
) -> Result<HttpResponse, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;
    let user_id = client.require_login()?;

    let (poll_form, mut errors) = parse_poll_form(&form);

    if errors.is_empty() {
        match poll::create_poll(&db, user_id, &poll_form).await {
            Ok(poll_id) => {
                log::info!("poll {} created by user {}", poll_id, user_id);
                return Ok(HttpResponse::Found()
                    .append_header(("Location", format!("/polls/{}", poll_id)))
                    .finish());
            }
            Err(PollError::Validation(reasons)) => errors = reasons,
            Err(e) => return Err(map_poll_error(e)),
        }
    }

    Ok(PollCreateTemplate {
        client,
        errors,
        title: form.title.clone(),
        description: form.description.clone().unwrap_or_default(),
        end_time: form.end_time.clone().unwrap_or_default(),
        options_text: form.options.clone(),
    }
    .to_response())
}

#[derive(Template)]
#[template(path = "poll_edit.html")]
pub struct PollEditTemplate {
    pub client: ClientCtx,
    pub poll_id: i32,
    pub errors: Vec<String>,
    pub title: String,
    pub description: String,
    pub end_time: String,
    /// Prefill for the options textarea, one option per line.
    pub options_text: String,
    /// Current options with counts, so the form can flag the ones that
    /// cannot be removed.
    pub current_options: Vec<OptionWithVotes>,
}

async fn poll_for_editor(
    db: &DatabaseConnection,
    poll_id: i32,
    editor_id: i32,
) -> Result<polls::Model, Error> {
    let poll = polls::Entity::find_by_id(poll_id)
        .one(db)
        .await
        .map_err(|e| {
            log::error!("poll lookup failed: {}", e);
            error::ErrorInternalServerError("Internal error.")
        })?
        .ok_or_else(|| error::ErrorNotFound("Poll not found."))?;

    if poll.creator_id != editor_id {
        return Err(error::ErrorForbidden("Only the poll creator may do this."));
    }
    Ok(poll)
}

fn format_end_time(end_time: Option<chrono::NaiveDateTime>) -> String {
    end_time
        .map(|t| t.format("%Y-%m-%dT%H:%M").to_string())
        .unwrap_or_default()
}

#[get("/polls/{poll_id}/edit")]
pub async fn edit_poll_form(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let poll_id = path.into_inner();
    let poll = poll_for_editor(&db, poll_id, user_id).await?;

    let options = poll::options_with_votes(&db, poll_id).await.map_err(|e| {
        log::error!("option lookup failed: {}", e);
        error::ErrorInternalServerError("Internal error.")
    })?;

    let options_text = options
        .iter()
        .map(|o| o.option_text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(PollEditTemplate {
        client,
        poll_id,
        errors: Vec::new(),
        title: poll.title,
        description: poll.description.unwrap_or_default(),
        end_time: format_end_time(poll.end_time),
        options_text,
        current_options: options,
    }
    .to_response())
}

#[post("/polls/{poll_id}/edit")]
pub async fn edit_poll_post(
    client: ClientCtx,
    cookies: actix_session::Session,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<PollFormData>,
) -> Result<HttpResponse, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;
    let user_id = client.require_login()?;
    let poll_id = path.into_inner();

    let (poll_form, mut errors) = parse_poll_form(&form);

    if errors.is_empty() {
        match poll::edit_poll(&db, poll_id, user_id, &poll_form).await {
            Ok(()) => {
                return Ok(HttpResponse::Found()
                    .append_header(("Location", format!("/polls/{}", poll_id)))
                    .finish());
            }
            Err(PollError::Validation(reasons)) => errors = reasons,
            Err(e @ PollError::CannotRemoveVotedOption(_)) => errors = vec![e.to_string()],
            Err(e) => return Err(map_poll_error(e)),
        }
    }

    // Re-render against the current stored option set.
    let options = poll::options_with_votes(&db, poll_id).await.map_err(|e| {
        log::error!("option lookup failed: {}", e);
        error::ErrorInternalServerError("Internal error.")
    })?;

    Ok(PollEditTemplate {
        client,
        poll_id,
        errors,
        title: form.title.clone(),
        description: form.description.clone().unwrap_or_default(),
        end_time: form.end_time.clone().unwrap_or_default(),
        options_text: form.options.clone(),
        current_options: options,
    }
    .to_response())
}

#[derive(Template)]
#[template(path = "poll_delete.html")]
pub struct PollDeleteTemplate {
    pub client: ClientCtx,
    pub poll_id: i32,
    pub title: String,
    pub total_votes: u64,
    pub total_comments: u64,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteFormData {
    pub csrf_token: String,
    pub confirm: String,
}

async fn delete_confirm_page(
    client: ClientCtx,
    db: &DatabaseConnection,
    poll: polls::Model,
    error_message: Option<String>,
) -> Result<HttpResponse, Error> {
    let internal = |e: sea_orm::DbErr| {
        log::error!("delete confirm counts: {}", e);
        error::ErrorInternalServerError("Internal error.")
    };

    let total_votes = votes::Entity::find()
        .filter(votes::Column::PollId.eq(poll.id))
        .count(db)
        .await
        .map_err(internal)? as u64;
    let total_comments = comments::Entity::find()
        .filter(comments::Column::PollId.eq(poll.id))
        .count(db)
        .await
        .map_err(internal)? as u64;

    Ok(PollDeleteTemplate {
        client,
        poll_id: poll.id,
        title: poll.title,
        total_votes,
        total_comments,
        error: error_message,
    }
    .to_response())
}

#[get("/polls/{poll_id}/delete")]
pub async fn delete_poll_form(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let user_id = client.require_login()?;
    let poll = poll_for_editor(&db, path.into_inner(), user_id).await?;
    delete_confirm_page(client, &db, poll, None).await
}

#[post("/polls/{poll_id}/delete")]
pub async fn delete_poll_post(
    client: ClientCtx,
    cookies: actix_session::Session,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<DeleteFormData>,
) -> Result<HttpResponse, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;
    let user_id = client.require_login()?;
    let poll_id = path.into_inner();

    if form.confirm.trim().to_uppercase() != "DELETE" {
        let poll = poll_for_editor(&db, poll_id, user_id).await?;
        return delete_confirm_page(
            client,
            &db,
            poll,
            Some("Please type \"DELETE\" to confirm deletion.".to_owned()),
        )
        .await;
    }

    poll::delete_poll(&db, poll_id, user_id)
        .await
        .map_err(map_poll_error)?;
    log::info!("poll {} deleted by user {}", poll_id, user_id);

    Ok(HttpResponse::Found()
        .append_header(("Location", "/"))
        .finish())
}
