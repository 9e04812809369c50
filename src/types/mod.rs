//! Wire types for the HTTP API

pub mod request;

pub use request::{PredictRequest, PredictResponse};
