// ABOUTME: Control-plane client seam for the Power Virtual Server API.
// ABOUTME: Exports the ControlPlane trait, wire models, errors, and the HTTP client.

mod auth;
mod client;
mod error;
mod models;
mod traits;

pub use auth::{BearerToken, IamAuthenticator};
pub use client::PowerVsClient;
pub use error::CloudError;
pub use models::*;
pub use traits::ControlPlane;
