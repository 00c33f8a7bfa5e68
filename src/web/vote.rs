//! Poll detail page: voting form and comments.

use crate::middleware::ClientCtx;
use crate::orm::{poll_options, polls, users};
use crate::poll::{self, CommentForPoll, PollError};
use crate::vote::{self, VoteError};
use actix_web::{error, get, post, web, Error, HttpResponse, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_poll).service(vote_on_poll).service(post_comment);
}

#[derive(Template)]
#[template(path = "poll.html")]
pub struct PollTemplate {
    pub client: ClientCtx,
    pub poll: polls::Model,
    pub creator_name: String,
    pub options: Vec<poll_options::Model>,
    pub is_closed: bool,
    /// Text of the option this viewer already picked, if any.
    pub voted_option_text: Option<String>,
    pub results_visible: bool,
    pub comments: Vec<CommentForPoll>,
}

async fn find_poll(db: &DatabaseConnection, poll_id: i32) -> Result<polls::Model, Error> {
    polls::Entity::find_by_id(poll_id)
        .one(db)
        .await
        .map_err(|e| {
            log::error!("poll lookup failed: {}", e);
            error::ErrorInternalServerError("Internal error.")
        })?
        .ok_or_else(|| error::ErrorNotFound("Poll not found."))
}

#[get("/polls/{poll_id}")]
pub async fn view_poll(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let poll_id = path.into_inner();
    let poll = find_poll(&db, poll_id).await?;

    let internal = |e: sea_orm::DbErr| {
        log::error!("poll page query: {}", e);
        error::ErrorInternalServerError("Internal error.")
    };

    let creator_name = users::Entity::find_by_id(poll.creator_id)
        .one(db.get_ref())
        .await
        .map_err(internal)?
        .map(|u| u.username)
        .unwrap_or_else(|| "unknown".to_owned());

    let options = poll_options::Entity::find()
        .filter(poll_options::Column::PollId.eq(poll_id))
        .order_by_asc(poll_options::Column::Id)
        .all(db.get_ref())
        .await
        .map_err(internal)?;

    let voted_option_id = match client.get_id() {
        Some(user_id) => vote::vote_for_user(db.get_ref(), poll_id, user_id)
            .await
            .map_err(internal)?
            .map(|v| v.option_id),
        None => None,
    };
    let voted_option_text = voted_option_id.and_then(|id| {
        options
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.option_text.clone())
    });

    let results_visible = vote::can_view_results(db.get_ref(), &poll, client.get_id())
        .await
        .map_err(internal)?;

    let comments = poll::comments_for_poll(db.get_ref(), poll_id)
        .await
        .map_err(internal)?;

    let is_closed = vote::is_poll_closed(&poll, Utc::now().naive_utc());

    Ok(PollTemplate {
        client,
        poll,
        creator_name,
        options,
        is_closed,
        voted_option_text,
        results_visible,
        comments,
    }
    .to_response())
}

#[derive(Deserialize)]
pub struct VoteFormData {
    pub csrf_token: String,
    pub option_id: i32,
}

#[post("/polls/{poll_id}/vote")]
pub async fn vote_on_poll(
    client: ClientCtx,
    cookies: actix_session::Session,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<VoteFormData>,
) -> Result<HttpResponse, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;
    let user_id = client.require_login()?;
    let poll_id = path.into_inner();

    match vote::cast_vote(&db, poll_id, user_id, form.option_id).await {
        Ok(_) => {
            log::debug!("user {} voted on poll {}", user_id, poll_id);
        }
        // Their vote already counts; results are the right destination.
        Err(VoteError::AlreadyVoted) => {}
        Err(VoteError::NotFound) => return Err(error::ErrorNotFound("Poll not found.")),
        Err(VoteError::PollClosed) => {
            return Err(error::ErrorForbidden("This poll has ended."))
        }
        Err(VoteError::InvalidOption) => {
            return Err(error::ErrorBadRequest("Invalid option selected."))
        }
        Err(VoteError::Db(e)) => {
            log::error!("cast_vote failed: {}", e);
            return Err(error::ErrorInternalServerError("Internal error."));
        }
    }

    Ok(HttpResponse::Found()
        .append_header(("Location", format!("/polls/{}/results", poll_id)))
        .finish())
}

#[derive(Deserialize)]
pub struct CommentFormData {
    pub csrf_token: String,
    pub comment_text: String,
}

#[post("/polls/{poll_id}/comments")]
pub async fn post_comment(
    client: ClientCtx,
    cookies: actix_session::Session,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
    form: web::Form<CommentFormData>,
) -> Result<HttpResponse, Error> {
    crate::middleware::csrf::validate_csrf_token(&cookies, &form.csrf_token)?;
    let user_id = client.require_login()?;
    let poll_id = path.into_inner();

    match poll::add_comment(&db, poll_id, user_id, &form.comment_text).await {
        Ok(_) => {}
        Err(PollError::NotFound) => return Err(error::ErrorNotFound("Poll not found.")),
        Err(PollError::Validation(reasons)) => {
            return Err(error::ErrorBadRequest(reasons.join(" ")))
        }
        Err(PollError::Db(e)) => {
            log::error!("add_comment failed: {}", e);
            return Err(error::ErrorInternalServerError("Internal error."));
        }
        Err(e) => return Err(error::ErrorBadRequest(e.to_string())),
    }

    Ok(HttpResponse::Found()
        .append_header(("Location", format!("/polls/{}", poll_id)))
        .finish())
}
