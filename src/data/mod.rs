//! Record types and structured lumps.

pub mod brush;
pub mod displacement;
pub mod entities;
pub mod game_lump;
pub mod plane;
pub mod static_props;
pub mod texture;
pub mod util;
pub mod vertex;
