//! Low-level polygon math on `[x, y]` points.

mod area;
mod clip;
mod iou;

pub use area::*;
pub use clip::*;
pub use iou::*;

/// A point in image coordinates. Computations run in f64 even though boxes
/// store f32, so chained clipping does not accumulate visible error.
pub type Point = [f64; 2];
