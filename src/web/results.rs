//! Poll results page.

use crate::middleware::ClientCtx;
use crate::orm::{polls, users};
use crate::vote::{self, TallyRow};
use actix_web::{error, get, web, Error, HttpResponse};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{entity::*, DatabaseConnection};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_results);
}

#[derive(Template)]
#[template(path = "results.html")]
pub struct ResultsTemplate {
    pub client: ClientCtx,
    pub poll: polls::Model,
    pub creator_name: String,
    pub is_closed: bool,
    pub is_creator: bool,
    pub rows: Vec<TallyRow>,
    pub total_votes: i64,
}

#[get("/polls/{poll_id}/results")]
pub async fn view_results(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    let poll_id = path.into_inner();

    let internal = |e: sea_orm::DbErr| {
        log::error!("results page query: {}", e);
        error::ErrorInternalServerError("Internal error.")
    };

    let poll = polls::Entity::find_by_id(poll_id)
        .one(db.get_ref())
        .await
        .map_err(internal)?
        .ok_or_else(|| error::ErrorNotFound("Poll not found."))?;

    // Visibility is re-checked on every request; a poll may have closed
    // since the last page load.
    let visible = vote::can_view_results(db.get_ref(), &poll, client.get_id())
        .await
        .map_err(internal)?;
    if !visible {
        return Ok(HttpResponse::Found()
            .append_header(("Location", format!("/polls/{}", poll_id)))
            .finish());
    }

    let creator_name = users::Entity::find_by_id(poll.creator_id)
        .one(db.get_ref())
        .await
        .map_err(internal)?
        .map(|u| u.username)
        .unwrap_or_else(|| "unknown".to_owned());

    let rows = vote::tally(db.get_ref(), poll_id).await.map_err(|e| {
        log::error!("tally failed: {}", e);
        error::ErrorInternalServerError("Internal error.")
    })?;
    let total_votes: i64 = rows.iter().map(|r| r.vote_count).sum();

    let is_closed = vote::is_poll_closed(&poll, Utc::now().naive_utc());
    let is_creator = client.get_id() == Some(poll.creator_id);

    Ok(ResultsTemplate {
        client,
        poll,
        creator_name,
        is_closed,
        is_creator,
        rows,
        total_votes,
    }
    .to_response())
}
