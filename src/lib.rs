//! Studio API: user profiles, projects, subscriptions and invoices behind
//! a uniform JSON envelope, backed by Supabase (or in-memory stores).

pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AppConfig;
pub use routes::app;
pub use state::AppState;
