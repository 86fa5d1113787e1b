pub mod auth;
pub mod connection;
pub mod registry;

pub use registry::ChannelRegistry;
