pub mod client;
pub mod core;
pub mod resources;

pub use client::{BeyondhClient, ClientBuilder};
pub use crate::core::{
    config::{ClientConfig, ConfigError, TransportStrategy},
    errors::BeyondhError,
    kernel::ContentFilter,
    types::*,
};
