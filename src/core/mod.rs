//! Authentication core, identity storage and configuration

pub mod auth;
pub mod config;
pub mod db;
