//! Polygon geometry for rotated detection boxes: shoelace area, convex
//! clipping, polygon IoU, and the per-tile and cross-tile non-maximum
//! suppression built on top of them.

pub mod math;
pub use math::*;
pub mod nms;
pub use nms::*;
