//! Placard kernel library.
//!
//! Paginated, filtered, sorted and searchable listings over PostgreSQL, the
//! category, post, user and location services built on them, and the user
//! seeder. The `placard` binary is a thin command line over these.

pub mod config;
pub mod db;
pub mod error;
pub mod listing;
pub mod models;
pub mod search;
pub mod seed;
pub mod services;
