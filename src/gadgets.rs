pub mod activation;
pub mod correlate;
pub mod dot_prod;
pub mod normalization;
pub mod pool;

// Special: shared scalar and shape types
pub mod gadget;
