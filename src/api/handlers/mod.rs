pub mod control;
pub mod cron;
pub mod health;
