pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod listing;
pub mod markdown;
pub mod session;
pub mod templates;
pub mod toast;

pub use app::{AppState, SharedAppState, create_app};
pub use config::Config;
pub use error::{AppError, AppResult};
