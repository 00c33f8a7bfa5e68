pub mod comments;
pub mod poll_options;
pub mod polls;
pub mod users;
pub mod votes;
