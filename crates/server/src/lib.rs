//! HTTP surface: JSON over HTTP for the forecasting pipeline and the
//! trading simulation engine.

pub mod app;
pub mod error;
pub mod routes;
pub mod state;

pub use app::{create_app, ServerConfig};
pub use error::{AppError, AppResult};
pub use state::{AppContext, Resources, ServerState};
