pub mod loader;
pub mod timing;
