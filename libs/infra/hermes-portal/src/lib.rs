//! Headless-browser driver for the SERFF filing portal.

pub mod errors;
pub mod navigator;

pub use errors::PortalError;
pub use navigator::{PortalNavigator, SearchResultRow};
