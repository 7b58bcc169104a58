pub mod activation;
pub mod conv2d;
pub mod fully_connected;
pub mod noop;
pub mod normalization;
pub mod pool_2d;
pub mod shape;

// Special: dag
pub mod dag;

// Special: layer
pub mod layer;
