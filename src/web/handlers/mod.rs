//! HTTP request handlers organized by domain

pub mod auth;
pub mod channels;
pub mod epg;
pub mod health;
pub mod refresh;
