//! Remote Auth Client for GoTrue-compatible identity providers.
//!
//! [`AuthApi`] is the seam the session engine talks to; [`GoTrueClient`]
//! implements it over the `/auth/v1` REST API with `reqwest`.

mod api;
mod client;
mod error;

pub use api::AuthApi;
pub use client::GoTrueClient;
pub use error::{ClientError, ClientResult};
