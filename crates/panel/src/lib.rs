//! Client for the account panel's UniProxy node API.
//!
//! - `PanelClient`: the fetch/push seam used by the authenticator
//! - `HttpPanelClient`: reqwest implementation with bounded timeouts
//! - `PanelUser`, `Traffic`, `TrafficReport`: wire types

pub mod client;
pub mod error;
pub mod types;

pub use {
    client::{HttpPanelClient, PanelClient, SharedPanelClient},
    error::{Error, Result},
    types::{PanelUser, Traffic, TrafficReport, UserList},
};
