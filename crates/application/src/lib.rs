//! Application services and ports.

#![forbid(unsafe_code)]

mod access_filter;
mod access_ports;
mod access_service;

pub use access_filter::AccessFilter;
pub use access_ports::{AccessRepository, ResourceAssignee};
pub use access_service::AccessResolutionService;
