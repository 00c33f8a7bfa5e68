//! Runtime configuration from environment variables.
//!
//! Secrets (database credentials, SECRET_KEY) stay in the environment;
//! `.env` is loaded by the binary before this runs.

use anyhow::Context;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub site_name: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
            site_name: env::var("SITE_NAME").unwrap_or_else(|_| "VoteSphere".to_owned()),
        })
    }
}
