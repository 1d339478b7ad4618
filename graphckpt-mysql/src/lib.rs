//! # graphckpt MySQL backend
//!
//! [`MySqlSaver`] and [`MySqlStore`] implement the `CheckpointSaver` and
//! `Store` traits from `graphckpt-common` on top of a sqlx MySQL pool.
//!
//! Both need MySQL 8.0.19 or newer (`JSON_TABLE`, `INSERT ... AS new`).
//! Call `setup()` once before first use to create or upgrade the tables.

mod codec;
pub mod config;
pub mod migrations;
mod saver;
pub mod sql;
mod store;

pub use config::{connect, parse_conn_string};
pub use saver::MySqlSaver;
pub use store::MySqlStore;
