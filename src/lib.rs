pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod imap;
pub mod mail;
pub mod models;
pub mod pdf;
pub mod routes;
pub mod services;
pub mod store;
