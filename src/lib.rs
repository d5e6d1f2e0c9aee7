pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod notify;
pub mod provisioning;
pub mod routes;
pub mod services;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use routes::app;
pub use state::AppState;
