//! HTTP service exposing pretrained chest X-ray classifiers.

pub mod config;
pub mod decode;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod labels;
pub mod models;
pub mod preprocess;
pub mod state;
pub mod store;

pub use error::ServiceError;
pub use handlers::routes;
pub use state::{AppState, ModelEndpoint};
