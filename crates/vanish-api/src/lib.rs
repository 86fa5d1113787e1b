pub mod auth;
pub mod error;
pub mod handle;
pub mod messages;
pub mod middleware;
pub mod state;
pub mod users;
