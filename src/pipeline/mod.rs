pub mod export;
pub mod persistence;
pub mod scenes;
pub mod session;
mod smf;
