//! VoteSphere: a server-rendered polling and voting web application.
//!
//! Core rules live in [`poll`] (poll repository) and [`vote`] (vote
//! ledger); everything under [`web`] is presentation over those two.

pub mod config;
pub mod create_user;
pub mod db;
pub mod middleware;
pub mod orm;
pub mod poll;
pub mod session;
pub mod template;
pub mod user;
pub mod vote;
pub mod web;
