//! urlsh: a URL shortener service with visit insights, plus a typed API
//! client and view-models for driving it from a terminal.

pub mod admin;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod form;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod render;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;
