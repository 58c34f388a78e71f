//! Value types passed between pipeline stages.

mod image_data;
mod messages;
mod rbox;
mod tile_grid;

pub use image_data::*;
pub use messages::*;
pub use rbox::*;
pub use tile_grid::*;
