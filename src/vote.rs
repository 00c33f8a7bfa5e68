//! Vote ledger: enforces one vote per user per poll, records votes, and
//! computes tallies.
//!
//! The one-vote invariant is held two ways: a check-then-insert inside a
//! transaction, and a `UNIQUE (poll_id, user_id)` index on the votes table
//! whose duplicate-key error maps back to `AlreadyVoted`. Poll closing is
//! derived from `end_time` against UTC wall-clock time and is never stored.

use crate::orm::{poll_options, polls, votes};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    entity::*, query::*, DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement,
};
use std::fmt;

#[derive(Debug)]
pub enum VoteError {
    NotFound,
    PollClosed,
    AlreadyVoted,
    InvalidOption,
    Db(DbErr),
}

impl fmt::Display for VoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Poll not found."),
            Self::PollClosed => write!(f, "This poll has ended."),
            Self::AlreadyVoted => write!(f, "You have already voted in this poll."),
            Self::InvalidOption => write!(f, "Invalid option selected."),
            Self::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl From<DbErr> for VoteError {
    fn from(e: DbErr) -> Self {
        Self::Db(e)
    }
}

/// A poll is closed once its end time is set and has been reached.
/// Both sides of the comparison are UTC.
pub fn is_poll_closed(poll: &polls::Model, now: NaiveDateTime) -> bool {
    matches!(poll.end_time, Some(end_time) if end_time <= now)
}

fn is_unique_violation(e: &DbErr) -> bool {
    // Postgres 23505; sqlx surfaces it in the message text.
    e.to_string().contains("duplicate key")
}

/// Record one user's vote on a poll.
///
/// Checked in order: poll exists, poll is open, user has not voted,
/// option belongs to the poll. The existence check and insert share a
/// transaction, with the unique index as the arbiter if two requests from
/// the same user race past the check.
pub async fn cast_vote(
    db: &DatabaseConnection,
    poll_id: i32,
    user_id: i32,
    option_id: i32,
) -> Result<votes::Model, VoteError> {
    let poll = polls::Entity::find_by_id(poll_id)
        .one(db)
        .await?
        .ok_or(VoteError::NotFound)?;

    let now = Utc::now().naive_utc();
    if is_poll_closed(&poll, now) {
        return Err(VoteError::PollClosed);
    }

    let txn = db.begin().await?;

    let existing = votes::Entity::find()
        .filter(votes::Column::PollId.eq(poll_id))
        .filter(votes::Column::UserId.eq(user_id))
        .one(&txn)
        .await?;
    if existing.is_some() {
        return Err(VoteError::AlreadyVoted);
    }

    let option = poll_options::Entity::find_by_id(option_id).one(&txn).await?;
    match option {
        Some(ref option) if option.poll_id == poll_id => {}
        _ => return Err(VoteError::InvalidOption),
    }

    let vote = votes::ActiveModel {
        poll_id: Set(poll_id),
        user_id: Set(user_id),
        option_id: Set(option_id),
        voted_at: Set(now),
        ..Default::default()
    };
    let vote = match vote.insert(&txn).await {
        Ok(vote) => vote,
        Err(e) if is_unique_violation(&e) => return Err(VoteError::AlreadyVoted),
        Err(e) => return Err(VoteError::Db(e)),
    };

    txn.commit().await?;
    Ok(vote)
}

/// Whether the user has a recorded vote for this poll.
pub async fn has_voted(
    db: &DatabaseConnection,
    poll_id: i32,
    user_id: i32,
) -> Result<bool, DbErr> {
    Ok(votes::Entity::find()
        .filter(votes::Column::PollId.eq(poll_id))
        .filter(votes::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .is_some())
}

/// The option a user picked in this poll, if any.
pub async fn vote_for_user(
    db: &DatabaseConnection,
    poll_id: i32,
    user_id: i32,
) -> Result<Option<votes::Model>, DbErr> {
    votes::Entity::find()
        .filter(votes::Column::PollId.eq(poll_id))
        .filter(votes::Column::UserId.eq(user_id))
        .one(db)
        .await
}

/// One row of a poll's tally.
#[derive(Debug, Clone, PartialEq)]
pub struct TallyRow {
    pub option_id: i32,
    pub option_text: String,
    pub vote_count: i64,
    pub percentage: f64,
}

#[derive(Debug, FromQueryResult)]
struct OptionCount {
    option_id: i32,
    option_text: String,
    vote_count: i64,
}

/// Turn raw per-option counts into ranked tally rows.
///
/// Percentage is `count / total * 100` rounded to one decimal, zero for
/// every row when there are no votes. Rows are ordered by descending vote
/// count, ties broken by ascending option id, so the output is
/// deterministic for display and export.
fn rank_tally(counts: Vec<(i32, String, i64)>) -> Vec<TallyRow> {
    let total: i64 = counts.iter().map(|(_, _, n)| n).sum();

    let mut rows: Vec<TallyRow> = counts
        .into_iter()
        .map(|(option_id, option_text, vote_count)| {
            let percentage = if total > 0 {
                (vote_count as f64 / total as f64 * 1000.0).round() / 10.0
            } else {
                0.0
            };
            TallyRow {
                option_id,
                option_text,
                vote_count,
                percentage,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.vote_count
            .cmp(&a.vote_count)
            .then(a.option_id.cmp(&b.option_id))
    });
    rows
}

/// Tally a poll: vote counts and percentages per option, ranked.
pub async fn tally(db: &DatabaseConnection, poll_id: i32) -> Result<Vec<TallyRow>, VoteError> {
    polls::Entity::find_by_id(poll_id)
        .one(db)
        .await?
        .ok_or(VoteError::NotFound)?;

    let sql = r#"
        SELECT o.id AS option_id, o.option_text, COUNT(v.id) AS vote_count
        FROM poll_options o
        LEFT JOIN votes v ON v.option_id = o.id
        WHERE o.poll_id = $1
        GROUP BY o.id, o.option_text
        ORDER BY o.id ASC
    "#;
    let counts = OptionCount::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![poll_id.into()],
    ))
    .all(db)
    .await?;

    Ok(rank_tally(
        counts
            .into_iter()
            .map(|c| (c.option_id, c.option_text, c.vote_count))
            .collect(),
    ))
}

/// Results visibility gate: the viewer has voted, or the poll is closed,
/// or the viewer is the creator. Evaluated fresh on every request since
/// closing state moves with the clock.
pub async fn can_view_results(
    db: &DatabaseConnection,
    poll: &polls::Model,
    viewer: Option<i32>,
) -> Result<bool, DbErr> {
    if is_poll_closed(poll, Utc::now().naive_utc()) {
        return Ok(true);
    }

    match viewer {
        Some(user_id) if user_id == poll.creator_id => Ok(true),
        Some(user_id) => has_voted(db, poll.id, user_id).await,
        None => Ok(false),
    }
}
