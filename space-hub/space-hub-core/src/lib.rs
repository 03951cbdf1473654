pub mod config;
pub mod entity;
pub mod events;
pub mod filter;
pub mod mutation;
pub mod preferences;
pub mod projection;
pub mod service;
pub mod session;
pub mod sort;
pub mod state;
pub mod tree;

#[cfg(test)]
pub(crate) mod testing;
