pub mod engine;
pub mod geo;

pub use engine::*;
pub use geo::*;
