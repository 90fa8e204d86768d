//! Admin HTTP surface over the cron manager.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
