pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod resilience;
pub mod routes;
pub mod runs;
pub mod state;
pub mod ws;
