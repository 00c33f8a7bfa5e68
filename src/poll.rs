//! Poll repository: creation, editing with vote-aware option protection,
//! deletion, and poll comments.
//!
//! All multi-row mutations run inside a single transaction; a failure
//! anywhere rolls the whole operation back. Field validation collects every
//! violation before reporting, so a form can show the complete list at once.

use crate::orm::{comments, poll_options, polls, votes};
use chrono::{Months, NaiveDateTime, Utc};
use sea_orm::{
    entity::*, query::*, DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement,
};
use std::fmt;

pub const TITLE_MIN_LENGTH: usize = 5;
pub const TITLE_MAX_LENGTH: usize = 255;
pub const DESCRIPTION_MAX_LENGTH: usize = 1000;
pub const OPTION_MAX_LENGTH: usize = 255;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 20;
pub const COMMENT_MAX_LENGTH: usize = 1000;

/// Raw poll form input as submitted; `validate_poll_form` turns it into a
/// `ValidatedPoll` or a complete list of violations.
#[derive(Debug, Clone, Default)]
pub struct PollForm {
    pub title: String,
    pub description: Option<String>,
    pub end_time: Option<NaiveDateTime>,
    pub options: Vec<String>,
}

/// Poll data that has passed field validation, ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPoll {
    pub title: String,
    pub description: Option<String>,
    pub end_time: Option<NaiveDateTime>,
    pub options: Vec<String>,
}

/// An option removal rejected because the option still has votes.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedOption {
    pub option_text: String,
    pub vote_count: i64,
}

#[derive(Debug)]
pub enum PollError {
    /// Every field-level violation, collected together.
    Validation(Vec<String>),
    NotFound,
    Forbidden,
    /// The edit would remove options that already have votes.
    CannotRemoveVotedOption(Vec<BlockedOption>),
    Db(DbErr),
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(reasons) => write!(f, "{}", reasons.join(" ")),
            Self::NotFound => write!(f, "Poll not found."),
            Self::Forbidden => write!(f, "Only the poll creator may do this."),
            Self::CannotRemoveVotedOption(blocked) => {
                write!(f, "Cannot remove options that already have votes:")?;
                for b in blocked {
                    write!(f, " \"{}\" ({} votes)", b.option_text, b.vote_count)?;
                }
                Ok(())
            }
            Self::Db(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl From<DbErr> for PollError {
    fn from(e: DbErr) -> Self {
        Self::Db(e)
    }
}

/// Validate a poll form against `now`, collecting every violation.
///
/// Options are trimmed and empties dropped before the count and duplicate
/// checks; duplicate detection is a case-sensitive exact match.
pub fn validate_poll_form(form: &PollForm, now: NaiveDateTime) -> Result<ValidatedPoll, Vec<String>> {
    let mut errors = Vec::new();

    let title = form.title.trim().to_owned();
    if title.is_empty() {
        errors.push("Poll title is required.".to_owned());
    } else if title.len() > TITLE_MAX_LENGTH {
        errors.push(format!(
            "Poll title is too long (max {} characters).",
            TITLE_MAX_LENGTH
        ));
    } else if title.len() < TITLE_MIN_LENGTH {
        errors.push(format!(
            "Poll title must be at least {} characters long.",
            TITLE_MIN_LENGTH
        ));
    }

    let description = form
        .description
        .as_ref()
        .map(|d| d.trim().to_owned())
        .filter(|d| !d.is_empty());
    if let Some(ref description) = description {
        if description.len() > DESCRIPTION_MAX_LENGTH {
            errors.push(format!(
                "Description is too long (max {} characters).",
                DESCRIPTION_MAX_LENGTH
            ));
        }
    }

    if let Some(end_time) = form.end_time {
        if end_time <= now {
            errors.push("End time must be in the future.".to_owned());
        } else if let Some(horizon) = now.checked_add_months(Months::new(12)) {
            if end_time > horizon {
                errors.push("End time cannot be more than 1 year from now.".to_owned());
            }
        }
    }

    let options: Vec<String> = form
        .options
        .iter()
        .map(|o| o.trim().to_owned())
        .filter(|o| !o.is_empty())
        .collect();

    for option in &options {
        if option.len() > OPTION_MAX_LENGTH {
            errors.push(format!(
                "Option text is too long (max {} characters): {}",
                OPTION_MAX_LENGTH,
                &option[..option
                    .char_indices()
                    .nth(50)
                    .map(|(i, _)| i)
                    .unwrap_or(option.len())]
            ));
        }
    }

    if options.len() < MIN_OPTIONS {
        errors.push(format!("Poll must have at least {} options.", MIN_OPTIONS));
    }
    if options.len() > MAX_OPTIONS {
        errors.push(format!(
            "Poll cannot have more than {} options.",
            MAX_OPTIONS
        ));
    }

    {
        let mut seen = std::collections::HashSet::new();
        if !options.iter().all(|o| seen.insert(o.as_str())) {
            errors.push("Duplicate options are not allowed.".to_owned());
        }
    }

    if errors.is_empty() {
        Ok(ValidatedPoll {
            title,
            description,
            end_time: form.end_time,
            options,
        })
    } else {
        Err(errors)
    }
}

/// Create a poll and its options atomically. Returns the new poll id.
pub async fn create_poll(
    db: &DatabaseConnection,
    creator_id: i32,
    form: &PollForm,
) -> Result<i32, PollError> {
    let now = Utc::now().naive_utc();
    let poll = validate_poll_form(form, now).map_err(PollError::Validation)?;

    let txn = db.begin().await?;

    let poll_model = polls::ActiveModel {
        creator_id: Set(creator_id),
        title: Set(poll.title),
        description: Set(poll.description),
        end_time: Set(poll.end_time),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for option_text in poll.options {
        poll_options::ActiveModel {
            poll_id: Set(poll_model.id),
            option_text: Set(option_text),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    Ok(poll_model.id)
}

/// An existing option together with its current vote count.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct OptionWithVotes {
    pub id: i32,
    pub option_text: String,
    pub vote_count: i64,
}

/// The fate of one option when reconciling the current set against an edit.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionChange {
    Unchanged { id: i32, option_text: String },
    Added { option_text: String },
    Removed { id: i32, option_text: String },
    RemovalBlocked { id: i32, option_text: String, vote_count: i64 },
}

/// Diff the current option set against the submitted texts.
///
/// Matching is by exact option text. A current option absent from the
/// submission becomes `Removed` when it has zero votes and
/// `RemovalBlocked` otherwise; submitted texts with no current counterpart
/// become `Added`.
pub fn reconcile_options(current: &[OptionWithVotes], submitted: &[String]) -> Vec<OptionChange> {
    let mut changes = Vec::with_capacity(current.len() + submitted.len());

    for opt in current {
        if submitted.iter().any(|s| *s == opt.option_text) {
            changes.push(OptionChange::Unchanged {
                id: opt.id,
                option_text: opt.option_text.clone(),
            });
        } else if opt.vote_count > 0 {
            changes.push(OptionChange::RemovalBlocked {
                id: opt.id,
                option_text: opt.option_text.clone(),
                vote_count: opt.vote_count,
            });
        } else {
            changes.push(OptionChange::Removed {
                id: opt.id,
                option_text: opt.option_text.clone(),
            });
        }
    }

    for text in submitted {
        if !current.iter().any(|c| c.option_text == *text) {
            changes.push(OptionChange::Added {
                option_text: text.clone(),
            });
        }
    }

    changes
}

/// Fetch a poll's options with their vote counts, in option id order.
pub async fn options_with_votes(
    db: &DatabaseConnection,
    poll_id: i32,
) -> Result<Vec<OptionWithVotes>, DbErr> {
    let sql = r#"
        SELECT o.id, o.option_text, COUNT(v.id) AS vote_count
        FROM poll_options o
        LEFT JOIN votes v ON v.option_id = o.id
        WHERE o.poll_id = $1
        GROUP BY o.id, o.option_text
        ORDER BY o.id ASC
    "#;

    OptionWithVotes::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![poll_id.into()],
    ))
    .all(db)
    .await
}

/// Edit a poll. Creator-only. Options are reconciled against the submitted
/// list; removing an option that has votes fails the whole edit. A poll
/// with zero total votes takes the simpler delete-and-recreate path.
pub async fn edit_poll(
    db: &DatabaseConnection,
    poll_id: i32,
    editor_id: i32,
    form: &PollForm,
) -> Result<(), PollError> {
    let poll = polls::Entity::find_by_id(poll_id)
        .one(db)
        .await?
        .ok_or(PollError::NotFound)?;

    if poll.creator_id != editor_id {
        return Err(PollError::Forbidden);
    }

    let now = Utc::now().naive_utc();
    let validated = validate_poll_form(form, now).map_err(PollError::Validation)?;

    let current = options_with_votes(db, poll_id).await?;
    let total_votes: i64 = current.iter().map(|o| o.vote_count).sum();
    let changes = reconcile_options(&current, &validated.options);

    let blocked: Vec<BlockedOption> = changes
        .iter()
        .filter_map(|c| match c {
            OptionChange::RemovalBlocked {
                option_text,
                vote_count,
                ..
            } => Some(BlockedOption {
                option_text: option_text.clone(),
                vote_count: *vote_count,
            }),
            _ => None,
        })
        .collect();
    if !blocked.is_empty() {
        return Err(PollError::CannotRemoveVotedOption(blocked));
    }

    let txn = db.begin().await?;

    let mut active: polls::ActiveModel = poll.into();
    active.title = Set(validated.title);
    active.description = Set(validated.description);
    active.end_time = Set(validated.end_time);
    active.updated_at = Set(now);
    active.update(&txn).await?;

    if total_votes == 0 {
        // No votes anywhere, so no per-option protection applies.
        poll_options::Entity::delete_many()
            .filter(poll_options::Column::PollId.eq(poll_id))
            .exec(&txn)
            .await?;
        for option_text in validated.options {
            poll_options::ActiveModel {
                poll_id: Set(poll_id),
                option_text: Set(option_text),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
    } else {
        for change in changes {
            match change {
                OptionChange::Removed { id, .. } => {
                    poll_options::Entity::delete_many()
                        .filter(poll_options::Column::Id.eq(id))
                        .exec(&txn)
                        .await?;
                }
                OptionChange::Added { option_text } => {
                    poll_options::ActiveModel {
                        poll_id: Set(poll_id),
                        option_text: Set(option_text),
                        created_at: Set(now),
                        ..Default::default()
                    }
                    .insert(&txn)
                    .await?;
                }
                OptionChange::Unchanged { .. } => {}
                // Filtered out above.
                OptionChange::RemovalBlocked { .. } => unreachable!(),
            }
        }
    }

    txn.commit().await?;
    Ok(())
}

/// Delete a poll and everything hanging off it. Creator-only.
///
/// Cascade order inside one transaction: votes, comments, options, poll.
pub async fn delete_poll(
    db: &DatabaseConnection,
    poll_id: i32,
    requester_id: i32,
) -> Result<(), PollError> {
    let poll = polls::Entity::find_by_id(poll_id)
        .one(db)
        .await?
        .ok_or(PollError::NotFound)?;

    if poll.creator_id != requester_id {
        return Err(PollError::Forbidden);
    }

    let txn = db.begin().await?;

    votes::Entity::delete_many()
        .filter(votes::Column::PollId.eq(poll_id))
        .exec(&txn)
        .await?;
    comments::Entity::delete_many()
        .filter(comments::Column::PollId.eq(poll_id))
        .exec(&txn)
        .await?;
    poll_options::Entity::delete_many()
        .filter(poll_options::Column::PollId.eq(poll_id))
        .exec(&txn)
        .await?;
    polls::Entity::delete_many()
        .filter(polls::Column::Id.eq(poll_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;
    Ok(())
}

/// Add a comment to a poll.
pub async fn add_comment(
    db: &DatabaseConnection,
    poll_id: i32,
    user_id: i32,
    text: &str,
) -> Result<comments::Model, PollError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PollError::Validation(vec![
            "Comment cannot be empty.".to_owned()
        ]));
    }
    if text.len() > COMMENT_MAX_LENGTH {
        return Err(PollError::Validation(vec![format!(
            "Comment is too long (max {} characters).",
            COMMENT_MAX_LENGTH
        )]));
    }

    polls::Entity::find_by_id(poll_id)
        .one(db)
        .await?
        .ok_or(PollError::NotFound)?;

    let comment = comments::ActiveModel {
        poll_id: Set(poll_id),
        user_id: Set(user_id),
        comment_text: Set(text.to_owned()),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(comment)
}

/// A comment joined with its author's name, for display.
#[derive(Debug, Clone, FromQueryResult)]
pub struct CommentForPoll {
    pub id: i32,
    pub username: String,
    pub comment_text: String,
    pub created_at: NaiveDateTime,
}

/// Newest comments for a poll, most recent first, capped at 50.
pub async fn comments_for_poll(
    db: &DatabaseConnection,
    poll_id: i32,
) -> Result<Vec<CommentForPoll>, DbErr> {
    let sql = r#"
        SELECT c.id, u.username, c.comment_text, c.created_at
        FROM comments c
        JOIN users u ON u.id = c.user_id
        WHERE c.poll_id = $1
        ORDER BY c.created_at DESC
        LIMIT 50
    "#;

    CommentForPoll::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        sql,
        vec![poll_id.into()],
    ))
    .all(db)
    .await
}
