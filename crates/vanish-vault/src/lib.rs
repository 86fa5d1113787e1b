pub mod eraser;
mod vault;

pub use vault::Vault;
