//! Poll listing: the front page, with filtering, search, and pagination,
//! plus the JSON search endpoint.

use crate::middleware::ClientCtx;
use crate::template::Paginator;
use actix_web::{error, get, web, Error, Responder};
use askama_actix::{Template, TemplateToResponse};
use chrono::Utc;
use sea_orm::{DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement, Value};
use serde::Deserialize;

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_index).service(search_api);
}

pub const POLLS_PER_PAGE: i64 = 12;

#[derive(Deserialize)]
pub struct IndexQuery {
    pub q: Option<String>,
    pub filter: Option<String>,
    pub page: Option<i32>,
}

#[derive(Debug, FromQueryResult)]
struct PollOverviewRow {
    id: i32,
    title: String,
    description: Option<String>,
    end_time: Option<chrono::NaiveDateTime>,
    created_at: chrono::NaiveDateTime,
    creator_name: String,
    vote_count: i64,
}

/// One poll card on the listing page.
pub struct PollCard {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub end_time: Option<chrono::NaiveDateTime>,
    pub created_at: chrono::NaiveDateTime,
    pub creator_name: String,
    pub vote_count: i64,
    pub is_closed: bool,
}

#[derive(Debug, Default, FromQueryResult)]
pub struct SiteStats {
    pub total_polls: i64,
    pub total_votes: i64,
    pub active_polls: i64,
    pub total_users: i64,
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub client: ClientCtx,
    pub cards: Vec<PollCard>,
    pub paginator: Paginator,
    pub query: Option<String>,
    pub filter: String,
    pub stats: SiteStats,
}

/// Builds the WHERE clause and bind values shared by the count and page
/// queries. `$n` placeholders are numbered from the current value list.
fn listing_conditions(
    query: &Option<String>,
    filter: &str,
    viewer: Option<i32>,
    now: chrono::NaiveDateTime,
) -> (String, Vec<Value>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(q) = query {
        values.push(format!("%{}%", q).into());
        let n = values.len();
        conditions.push(format!(
            "(p.title LIKE ${0} OR p.description LIKE ${0})",
            n
        ));
    }

    match filter {
        "active" => {
            values.push(now.into());
            conditions.push(format!(
                "(p.end_time IS NULL OR p.end_time > ${})",
                values.len()
            ));
        }
        "closed" => {
            values.push(now.into());
            conditions.push(format!(
                "(p.end_time IS NOT NULL AND p.end_time <= ${})",
                values.len()
            ));
        }
        "mine" => {
            if let Some(user_id) = viewer {
                values.push(user_id.into());
                conditions.push(format!("p.creator_id = ${}", values.len()));
            }
        }
        _ => {}
    }

    let where_sql = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_sql, values)
}

async fn fetch_stats(db: &DatabaseConnection, now: chrono::NaiveDateTime) -> Result<SiteStats, DbErr> {
    let sql = r#"
        SELECT
            (SELECT COUNT(*) FROM polls) AS total_polls,
            (SELECT COUNT(*) FROM votes) AS total_votes,
            (SELECT COUNT(*) FROM polls WHERE end_time IS NULL OR end_time > $1) AS active_polls,
            (SELECT COUNT(*) FROM users) AS total_users
    "#;
    Ok(SiteStats::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![now.into()],
    ))
    .one(db)
    .await?
    .unwrap_or_default())
}

#[get("/")]
pub async fn view_index(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    query: web::Query<IndexQuery>,
) -> Result<impl Responder, Error> {
    let now = Utc::now().naive_utc();
    let q = query
        .q
        .as_ref()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());
    let filter = query
        .filter
        .clone()
        .unwrap_or_else(|| "all".to_owned());
    let page = query.page.unwrap_or(1).max(1);

    let (where_sql, values) = listing_conditions(&q, &filter, client.get_id(), now);

    let count_sql = format!("SELECT COUNT(*) AS count FROM polls p {}", where_sql);
    let total = CountRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        &count_sql,
        values.clone(),
    ))
    .one(db.get_ref())
    .await
    .map_err(|e| {
        log::error!("index count query: {}", e);
        error::ErrorInternalServerError("Internal error.")
    })?
    .map(|r| r.count)
    .unwrap_or(0);

    let page_count = ((total + POLLS_PER_PAGE - 1) / POLLS_PER_PAGE).max(1) as i32;
    let page = page.min(page_count);
    let offset = (page as i64 - 1) * POLLS_PER_PAGE;

    let mut values = values;
    values.push(POLLS_PER_PAGE.into());
    let limit_n = values.len();
    values.push(offset.into());
    let offset_n = values.len();

    let list_sql = format!(
        r#"
        SELECT p.id, p.title, p.description, p.end_time, p.created_at,
               u.username AS creator_name,
               (SELECT COUNT(*) FROM votes v WHERE v.poll_id = p.id) AS vote_count
        FROM polls p
        JOIN users u ON u.id = p.creator_id
        {}
        ORDER BY p.created_at DESC
        LIMIT ${} OFFSET ${}
        "#,
        where_sql, limit_n, offset_n
    );
    let rows = PollOverviewRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        &list_sql,
        values,
    ))
    .all(db.get_ref())
    .await
    .map_err(|e| {
        log::error!("index listing query: {}", e);
        error::ErrorInternalServerError("Internal error.")
    })?;

    let cards = rows
        .into_iter()
        .map(|r| PollCard {
            is_closed: matches!(r.end_time, Some(t) if t <= now),
            id: r.id,
            title: r.title,
            description: r.description,
            end_time: r.end_time,
            created_at: r.created_at,
            creator_name: r.creator_name,
            vote_count: r.vote_count,
        })
        .collect();

    let stats = fetch_stats(db.get_ref(), now).await.map_err(|e| {
        log::error!("index stats query: {}", e);
        error::ErrorInternalServerError("Internal error.")
    })?;

    let mut base_url = String::from("/?");
    if let Some(ref q) = q {
        base_url.push_str(&format!("q={}&", urlencode(q)));
    }
    if filter != "all" {
        base_url.push_str(&format!("filter={}&", filter));
    }

    Ok(IndexTemplate {
        client,
        cards,
        paginator: Paginator::new(base_url, page, page_count),
        query: q,
        filter,
        stats,
    }
    .to_response())
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push_str("%20"),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[derive(Deserialize)]
pub struct SearchApiQuery {
    pub q: String,
}

/// Lightweight JSON search used by the navbar typeahead.
#[get("/api/search")]
pub async fn search_api(
    db: web::Data<DatabaseConnection>,
    query: web::Query<SearchApiQuery>,
) -> Result<impl Responder, Error> {
    let q = query.q.trim();
    if q.is_empty() {
        return Ok(web::Json(serde_json::json!({ "results": [] })));
    }

    let now = Utc::now().naive_utc();
    let sql = r#"
        SELECT p.id, p.title, p.description, p.end_time, p.created_at,
               u.username AS creator_name,
               (SELECT COUNT(*) FROM votes v WHERE v.poll_id = p.id) AS vote_count
        FROM polls p
        JOIN users u ON u.id = p.creator_id
        WHERE p.title LIKE $1 OR p.description LIKE $1
        ORDER BY p.created_at DESC
        LIMIT 10
    "#;
    let rows = PollOverviewRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![format!("%{}%", q).into()],
    ))
    .all(db.get_ref())
    .await
    .map_err(|e| {
        log::error!("search api query: {}", e);
        error::ErrorInternalServerError("Internal error.")
    })?;

    let results: Vec<serde_json::Value> = rows
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.id,
                "title": r.title,
                "creator": r.creator_name,
                "votes": r.vote_count,
                "closed": matches!(r.end_time, Some(t) if t <= now),
                "url": format!("/polls/{}", r.id),
            })
        })
        .collect();

    Ok(web::Json(serde_json::json!({ "results": results })))
}
