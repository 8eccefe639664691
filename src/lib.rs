// Library exports for pickto
// This allows integration tests and the binary to share the modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod posts;
pub mod routes;
pub mod state;
pub mod storage;
pub mod users;
pub mod votes;
