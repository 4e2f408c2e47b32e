#![allow(clippy::needless_range_loop, clippy::manual_clamp, clippy::float_cmp)]

pub mod cvar;
pub mod math;
pub mod matrix;
