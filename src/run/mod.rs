pub mod client;
pub mod engine;

pub use client::*;
pub use engine::*;
