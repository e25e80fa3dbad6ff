pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod files;
pub mod locations;
pub mod state;
pub mod storage;
