//! Real-time interest-based matchmaking core.

pub mod config;
pub mod error;
pub mod match_engine;
pub mod model;
pub mod notification_bus;
pub mod routes;
pub mod selector;
pub mod session_manager;
pub mod state;
pub mod store;
pub mod util;

pub use error::AppError;
pub use state::AppState;
