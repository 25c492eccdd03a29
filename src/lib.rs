pub mod app;
pub mod cleanup;
pub mod db;
pub mod error;
pub(crate) mod handlers;
pub mod seed;
pub mod state;
pub mod upload;
