pub mod error;
pub mod gadgets;
pub mod layers;
pub mod model;
pub mod utils;

pub use error::{ModelError, Result};
pub use gadgets::gadget::{Scalar, SpatialShape};
pub use model::Model;
