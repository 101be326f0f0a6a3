pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod identity;
pub mod relay;
pub mod routes;
pub mod session;
pub mod state;
