pub mod app;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod insights;
pub mod output;
pub mod schema;
pub mod select;
pub mod table;
pub mod validate;
pub mod warehouse;
