pub mod render;
pub mod store;
