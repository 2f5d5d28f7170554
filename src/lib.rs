//! epg-relay: resilient multi-mirror EPG aggregation.
//!
//! Channel guides are fetched from a set of redundant upstream mirrors,
//! normalized into one canonical record per channel and republished as JSON
//! or XMLTV.

pub mod assets;
pub mod config;
pub mod database;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod proxy;
pub mod repositories;
pub mod sources;
pub mod utils;
pub mod web;
