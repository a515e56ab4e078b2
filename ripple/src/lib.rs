mod caustics;
pub mod data;
mod debug;
mod pool;
pub mod render;
mod ripple;
pub mod rng;
pub mod settings;
pub mod shader;
mod water;

pub use crate::ripple::{Problem, Ripple};
