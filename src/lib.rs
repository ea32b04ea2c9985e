pub mod checker;
pub mod config;
pub mod error;
pub mod executor;
pub mod judge;
pub mod language;
pub mod routes;
pub mod sandbox;
pub mod status;
pub mod web_server;
