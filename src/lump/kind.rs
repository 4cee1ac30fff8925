//! Which lump slot holds what, per variant.

use strum::{Display, EnumIter, IntoStaticStr};

use crate::{
	layout::{select, Family, Family::*, Rule},
	lump::{LumpContext, NumType},
	map_type::MapType::{self, *},
};

/// Every lump this crate knows the meaning of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum LumpKind {
	Entities,
	Planes,
	Vertices,
	Normals,
	PatchVertices,
	Brushes,
	BrushSides,
	TextureData,
	Displacements,
	DisplacementVertices,
	LeafFaces,
	LeafBrushes,
	FaceEdges,
	Indices,
	TextureTable,
	DisplacementTriangles,
	PatchIndices,
	Visibility,
	Lightmaps,
	GameLump,
}

const QUAKE3_LIKE: &[Family] = &[Is(Quake3), Is(ET), Is(Raven)];

static ENTITIES: &[Rule<usize>] = &[
	Rule::new(&[Is(BlueShift)], 1),
	Rule::new(&[Of(MOHAA)], 14),
	Rule::new(&[Of(STEF2)], 16),
	Rule::new(&[Of(FAKK2)], 14),
	Rule::new(&[Is(CoD), Is(CoDDemo)], 29),
	Rule::new(&[Is(CoD2), Is(CoD4)], 37),
	Rule::new(
		&[Of(Quake), Of(Quake2), Of(Quake3), Of(Source), Is(Nightfire), Is(Titanfall)],
		0,
	),
];

static PLANES: &[Rule<usize>] = &[
	Rule::new(&[Is(BlueShift)], 0),
	Rule::new(&[Is(CoD2), Is(CoD4)], 4),
	Rule::new(&[Is(CoD), Is(CoDDemo)], 2),
	Rule::new(&[Of(Quake), Of(Quake2), Of(Source), Is(Nightfire), Is(Titanfall), Of(UberTools)], 1),
	Rule::new(&[Of(Quake3)], 2),
];

static VERTICES: &[Rule<usize>] = &[
	Rule::new(&[Of(Quake2)], 2),
	Rule::new(&[Of(Quake), Of(Source), Is(Titanfall)], 3),
	Rule::new(&[Of(MOHAA), Of(FAKK2), Is(Nightfire)], 4),
	Rule::new(&[Of(STEF2)], 6),
	Rule::new(&[Is(CoD), Is(CoDDemo)], 7),
	Rule::new(&[Is(CoD2)], 8),
	Rule::new(QUAKE3_LIKE, 10),
];

static NORMALS: &[Rule<usize>] = &[Rule::new(&[Is(Nightfire)], 5)];

static PATCH_VERTICES: &[Rule<usize>] = &[Rule::new(&[Is(CoD), Is(CoDDemo)], 25)];

static BRUSHES: &[Rule<usize>] = &[
	Rule::new(&[Of(Source)], 18),
	Rule::new(&[Of(Quake2)], 14),
	Rule::new(&[Of(MOHAA)], 12),
	Rule::new(&[Of(STEF2)], 13),
	Rule::new(&[Of(FAKK2)], 11),
	Rule::new(&[Is(Nightfire)], 15),
	Rule::new(&[Is(CoD), Is(CoDDemo)], 4),
	Rule::new(&[Is(CoD2)], 6),
	Rule::new(&[Of(Quake3)], 8),
];

static BRUSH_SIDES: &[Rule<usize>] = &[
	Rule::new(&[Of(Source)], 19),
	Rule::new(&[Of(Quake2)], 15),
	Rule::new(&[Of(STEF2)], 12),
	Rule::new(&[Of(MOHAA)], 11),
	Rule::new(&[Is(Nightfire)], 16),
	Rule::new(&[Is(CoD), Is(CoDDemo)], 3),
	Rule::new(&[Is(CoD2), Is(CoD4)], 5),
	Rule::new(&[Of(FAKK2)], 10),
	Rule::new(&[Of(Quake3)], 9),
];

static TEXTURE_DATA: &[Rule<usize>] = &[Rule::new(&[Of(Source), Is(Titanfall)], 2)];

static DISPLACEMENTS: &[Rule<usize>] = &[Rule::new(&[Of(Source)], 26)];

static DISPLACEMENT_VERTICES: &[Rule<usize>] = &[Rule::new(&[Of(Source)], 33)];

static GAME_LUMP: &[Rule<usize>] = &[Rule::new(&[Of(Source), Is(Titanfall)], 35)];

static VISIBILITY: &[Rule<usize>] = &[
	Rule::new(&[Of(Quake)], 4),
	Rule::new(&[Of(Quake2)], 3),
	Rule::new(&[Of(Source)], 4),
	Rule::new(&[Is(Nightfire)], 7),
	Rule::new(&[Of(STEF2)], 17),
	Rule::new(&[Of(MOHAA), Of(FAKK2)], 15),
	Rule::new(&[Is(CoD), Is(CoDDemo)], 28),
	Rule::new(QUAKE3_LIKE, 16),
];

static LIGHTMAPS: &[Rule<usize>] = &[
	Rule::new(&[Of(Quake)], 8),
	Rule::new(&[Of(Quake2)], 7),
	Rule::new(&[Of(Source)], 8),
	Rule::new(&[Is(Nightfire)], 10),
	Rule::new(&[Is(UberTools)], 2),
	Rule::new(&[Of(CoD)], 1),
	Rule::new(QUAKE3_LIKE, 14),
];

static LEAF_FACES: &[Rule<(usize, NumType)>] = &[
	Rule::new(&[Of(Quake)], (11, NumType::U16)),
	Rule::new(&[Is(Vindictus)], (16, NumType::U32)),
	Rule::new(&[Of(Source)], (16, NumType::U16)),
	Rule::new(&[Of(Quake2)], (9, NumType::U16)),
	Rule::new(&[Is(Nightfire)], (12, NumType::U32)),
	Rule::new(&[Of(MOHAA), Of(FAKK2)], (7, NumType::U32)),
	Rule::new(&[Of(STEF2)], (9, NumType::U32)),
	Rule::new(&[Is(CoD), Is(CoDDemo)], (23, NumType::U32)),
	Rule::new(QUAKE3_LIKE, (5, NumType::U32)),
];

static LEAF_BRUSHES: &[Rule<(usize, NumType)>] = &[
	Rule::new(&[Is(Vindictus)], (17, NumType::U32)),
	Rule::new(&[Of(Source)], (17, NumType::U16)),
	Rule::new(&[Of(Quake2)], (10, NumType::U16)),
	Rule::new(&[Is(Nightfire)], (13, NumType::U32)),
	Rule::new(&[Of(MOHAA), Of(FAKK2)], (6, NumType::U32)),
	Rule::new(&[Of(STEF2)], (8, NumType::U32)),
	Rule::new(&[Is(CoD), Is(CoDDemo)], (22, NumType::U32)),
	Rule::new(QUAKE3_LIKE, (6, NumType::U32)),
];

static FACE_EDGES: &[Rule<(usize, NumType)>] = &[
	Rule::new(&[Of(Quake)], (13, NumType::I32)),
	Rule::new(&[Of(Quake2)], (12, NumType::I32)),
	Rule::new(&[Of(Source)], (13, NumType::I32)),
];

static INDICES: &[Rule<(usize, NumType)>] = &[
	Rule::new(QUAKE3_LIKE, (11, NumType::U32)),
	Rule::new(&[Of(MOHAA), Of(FAKK2)], (5, NumType::U32)),
	Rule::new(&[Of(STEF2)], (7, NumType::U32)),
	Rule::new(&[Is(Nightfire)], (6, NumType::U32)),
	Rule::new(&[Is(CoD), Is(CoDDemo)], (8, NumType::U16)),
	Rule::new(&[Is(CoD2)], (9, NumType::U16)),
];

static TEXTURE_TABLE: &[Rule<(usize, NumType)>] = &[Rule::new(&[Of(Source)], (44, NumType::I32))];

static DISPLACEMENT_TRIANGLES: &[Rule<(usize, NumType)>] = &[Rule::new(&[Of(Source)], (48, NumType::U16))];

static PATCH_INDICES: &[Rule<(usize, NumType)>] = &[Rule::new(&[Is(CoD), Is(CoDDemo)], (26, NumType::U16))];

impl LumpKind {
	fn slot_table(self) -> Option<&'static [Rule<usize>]> {
		Some(match self {
			Self::Entities => ENTITIES,
			Self::Planes => PLANES,
			Self::Vertices => VERTICES,
			Self::Normals => NORMALS,
			Self::PatchVertices => PATCH_VERTICES,
			Self::Brushes => BRUSHES,
			Self::BrushSides => BRUSH_SIDES,
			Self::TextureData => TEXTURE_DATA,
			Self::Displacements => DISPLACEMENTS,
			Self::DisplacementVertices => DISPLACEMENT_VERTICES,
			Self::GameLump => GAME_LUMP,
			Self::Visibility => VISIBILITY,
			Self::Lightmaps => LIGHTMAPS,
			_ => return None,
		})
	}

	fn numeric_table(self) -> Option<&'static [Rule<(usize, NumType)>]> {
		Some(match self {
			Self::LeafFaces => LEAF_FACES,
			Self::LeafBrushes => LEAF_BRUSHES,
			Self::FaceEdges => FACE_EDGES,
			Self::Indices => INDICES,
			Self::TextureTable => TEXTURE_TABLE,
			Self::DisplacementTriangles => DISPLACEMENT_TRIANGLES,
			Self::PatchIndices => PATCH_INDICES,
			_ => return None,
		})
	}

	/// The directory slot this lump lives in for `map_type`, or `None` if the variant doesn't have it.
	pub fn index(self, map_type: MapType) -> Option<usize> {
		let ctx = LumpContext::of(map_type);
		let index = match self.numeric_table() {
			Some(table) => select(table, ctx, 0).map(|(index, _)| index),
			None => self.slot_table().and_then(|table| select(table, ctx, 0)),
		}?;
		// Some tables list a whole family that has fewer slots in one of its variants.
		(index < map_type.num_lumps()).then_some(index)
	}

	/// Element width for lumps of plain integers, `None` for every other kind or if the variant doesn't have it.
	pub fn num_type(self, map_type: MapType) -> Option<NumType> {
		self.numeric_table().and_then(|table| select(table, LumpContext::of(map_type), 0)).map(|(_, ty)| ty)
	}

	/// Finds the kind stored in `index` for `map_type`, if this crate knows it.
	pub fn for_index(index: usize, map_type: MapType) -> Option<Self> {
		use strum::IntoEnumIterator;
		Self::iter().find(|kind| kind.index(map_type) == Some(index))
	}
}
