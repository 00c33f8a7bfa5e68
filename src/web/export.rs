//! CSV export of poll results.
//!
//! The export is the same tally projection the results page shows, plus
//! poll metadata, gated by the same visibility rule.

use crate::config::Config;
use crate::middleware::ClientCtx;
use crate::orm::{polls, users};
use crate::vote::{self, TallyRow};
use actix_web::{error, get, web, Error, HttpResponse};
use chrono::Utc;
use sea_orm::{entity::*, DatabaseConnection};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(export_csv);
}

/// Quote a CSV field when it needs it; embedded quotes are doubled.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

fn csv_row(fields: &[&str]) -> String {
    let mut row = fields
        .iter()
        .map(|f| csv_field(f))
        .collect::<Vec<_>>()
        .join(",");
    row.push_str("\r\n");
    row
}

fn render_csv(
    poll: &polls::Model,
    creator_name: &str,
    exporter_name: &str,
    site_name: &str,
    rows: &[TallyRow],
    is_closed: bool,
    exported_at: chrono::NaiveDateTime,
) -> String {
    let total_votes: i64 = rows.iter().map(|r| r.vote_count).sum();
    let mut out = String::new();

    out.push_str(&csv_row(&["=== POLL RESULTS EXPORT ==="]));
    out.push_str(&csv_row(&[
        "Export Date",
        &exported_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]));
    out.push_str(&csv_row(&["Poll ID", &poll.id.to_string()]));
    out.push_str(&csv_row(&["Poll Title", &poll.title]));
    out.push_str(&csv_row(&["Poll Creator", creator_name]));
    out.push_str(&csv_row(&[
        "Poll Created",
        &poll.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]));
    match poll.end_time {
        Some(end_time) => {
            out.push_str(&csv_row(&[
                "Poll End Time",
                &end_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]));
            out.push_str(&csv_row(&[
                "Poll Status",
                if is_closed { "Closed" } else { "Active" },
            ]));
        }
        None => {
            out.push_str(&csv_row(&["Poll End Time", "No end time"]));
            out.push_str(&csv_row(&["Poll Status", "Active (No expiry)"]));
        }
    }
    if let Some(ref description) = poll.description {
        out.push_str(&csv_row(&["Poll Description", description]));
    }
    out.push_str(&csv_row(&["Total Votes", &total_votes.to_string()]));
    out.push_str("\r\n");

    out.push_str(&csv_row(&["=== VOTING RESULTS ==="]));
    out.push_str(&csv_row(&["Rank", "Option", "Votes", "Percentage"]));
    for (i, row) in rows.iter().enumerate() {
        out.push_str(&csv_row(&[
            &(i + 1).to_string(),
            &row.option_text,
            &row.vote_count.to_string(),
            &format!("{}%", row.percentage),
        ]));
    }
    out.push_str("\r\n");

    out.push_str(&csv_row(&["=== EXPORT INFO ==="]));
    out.push_str(&csv_row(&["Exported by", exporter_name]));
    out.push_str(&csv_row(&["Application", site_name]));

    out
}

#[get("/polls/{poll_id}/results.csv")]
pub async fn export_csv(
    client: ClientCtx,
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    path: web::Path<i32>,
) -> Result<HttpResponse, Error> {
    client.require_login()?;
    let poll_id = path.into_inner();

    let internal = |e: sea_orm::DbErr| {
        log::error!("export query: {}", e);
        error::ErrorInternalServerError("Internal error.")
    };

    let poll = polls::Entity::find_by_id(poll_id)
        .one(db.get_ref())
        .await
        .map_err(internal)?
        .ok_or_else(|| error::ErrorNotFound("Poll not found."))?;

    let visible = vote::can_view_results(db.get_ref(), &poll, client.get_id())
        .await
        .map_err(internal)?;
    if !visible {
        return Err(error::ErrorForbidden(
            "Results are not visible until you vote or the poll closes.",
        ));
    }

    let creator_name = users::Entity::find_by_id(poll.creator_id)
        .one(db.get_ref())
        .await
        .map_err(internal)?
        .map(|u| u.username)
        .unwrap_or_else(|| "unknown".to_owned());

    let rows = vote::tally(db.get_ref(), poll_id).await.map_err(|e| {
        log::error!("export tally failed: {}", e);
        error::ErrorInternalServerError("Internal error.")
    })?;

    let now = Utc::now().naive_utc();
    let is_closed = vote::is_poll_closed(&poll, now);
    let filename = format!(
        "poll-results-{}-{}.csv",
        poll.id,
        now.format("%Y-%m-%d-%H-%M-%S")
    );
    let body = render_csv(
        &poll,
        &creator_name,
        &client.get_name(),
        &config.site_name,
        &rows,
        is_closed,
        now,
    );

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .append_header((
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", filename),
        ))
        .body(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_with_commas_and_quotes_are_escaped() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn export_contains_one_row_per_option_in_tally_order() {
        let poll = polls::Model {
            id: 7,
            creator_id: 1,
            title: "Favorite color?".to_owned(),
            description: None,
            end_time: None,
            created_at: chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            updated_at: chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        };
        let rows = vec![
            TallyRow {
                option_id: 1,
                option_text: "Red".to_owned(),
                vote_count: 2,
                percentage: 66.7,
            },
            TallyRow {
                option_id: 2,
                option_text: "Blue, dark".to_owned(),
                vote_count: 1,
                percentage: 33.3,
            },
        ];
        let csv = render_csv(
            &poll,
            "alice",
            "alice",
            "VoteSphere",
            &rows,
            false,
            poll.created_at,
        );

        assert!(csv.contains("1,Red,2,66.7%"));
        assert!(csv.contains("2,\"Blue, dark\",1,33.3%"));
        assert!(csv.contains("Total Votes,3"));
        assert!(csv.contains("Poll Status,Active (No expiry)"));
    }
}
