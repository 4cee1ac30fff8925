#[cfg(feature = "bevy_reflect")]
pub(crate) use bevy_reflect::prelude::*;
pub(crate) use glam::*;
#[cfg(feature = "serde")]
pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use smallvec::*;
pub(crate) use std::collections::HashMap;
pub(crate) use std::sync::Arc;
pub(crate) use thiserror::Error;

pub(crate) use crate::util::*;
pub(crate) use crate::{BspResultDoingJobExt, JobDescription};

pub use crate::bsp::{Bsp, BspSettings};
pub use crate::data::{
	brush::{Brush, BrushSide},
	displacement::{Displacement, DisplacementTriangles, DisplacementVertex},
	entities::{Entities, Entity},
	game_lump::{GameLump, GameLumpId},
	plane::Plane,
	static_props::{StaticProp, StaticProps},
	texture::TextureData,
	vertex::Vertex,
};
pub use crate::file_source::{DirectoryFileSource, FileSource, MemoryFileSource};
pub use crate::header::{BspHeader, LumpInfo};
pub use crate::lump::{Lump, LumpContext, LumpData, LumpKind, LumpObject, NumList, NumType};
pub use crate::map_type::MapType;
pub use crate::writer::BspWriter;
pub use crate::{BspError, BspResult};
