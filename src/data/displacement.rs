//! Source displacement surfaces, and the vertex and triangle lumps they own runs of.

use crate::{
	layout::{raw_record, record_fields, select, Family::*, Field, Rule},
	lump::{LumpData, LumpKind, LumpRange, LumpTarget},
	map_type::MapType::*,
	prelude::*,
};

static LENGTHS: &[Rule<usize>] = &[
	Rule::new(&[Is(Source23)], 184),
	Rule::new(&[Is(Vindictus)], 232),
	Rule::new(&[Is(Source22)], 180),
	Rule::new(&[Of(Source)], 176),
];

static START_POSITION: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::Vec3(0))];
static FIRST_VERTEX: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::I32(12))];
static FIRST_TRIANGLE: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::I32(16))];
static POWER: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::I32(20))];
static MIN_TESSELATION: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::I32(24))];
static SMOOTHING_ANGLE: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::F32(28))];
static CONTENTS: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::I32(32))];
static FACE: &[Rule<Field>] = &[Rule::new(&[Is(Vindictus)], Field::I32(36)), Rule::new(&[Of(Source)], Field::U16(36))];
static LIGHTMAP_ALPHA_START: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::I32(40))];
static LIGHTMAP_SAMPLE_POSITION_START: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::I32(44))];

/// Where the edge neighbors start. Corner neighbors follow them, then the allowed vertex bitfield.
const NEIGHBORS_START: usize = 48;

static SUB_NEIGHBOR_LEN: &[Rule<usize>] = &[Rule::new(&[Is(Vindictus)], 8), Rule::new(&[Of(Source)], 6)];
static SUB_NEIGHBOR_INDEX: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::I16(0))];
static SUB_NEIGHBOR_ORIENTATION: &[Rule<Field>] = &[Rule::new(&[Is(Vindictus)], Field::I16(2)), Rule::new(&[Of(Source)], Field::U8(2))];
static SUB_NEIGHBOR_SPAN: &[Rule<Field>] = &[Rule::new(&[Is(Vindictus)], Field::I16(4)), Rule::new(&[Of(Source)], Field::U8(3))];
static SUB_NEIGHBOR_NEIGHBOR_SPAN: &[Rule<Field>] = &[Rule::new(&[Is(Vindictus)], Field::I16(6)), Rule::new(&[Of(Source)], Field::U8(4))];

static CORNER_NEIGHBOR_LEN: &[Rule<usize>] = &[Rule::new(&[Is(Vindictus)], 20), Rule::new(&[Of(Source)], 10)];
static CORNER_NEIGHBOR_INDEX: &[Rule<Field>] = &[Rule::new(&[Is(Vindictus)], Field::I32(0)), Rule::new(&[Of(Source)], Field::I16(0))];
static CORNER_NEIGHBOR_COUNT: &[Rule<Field>] = &[Rule::new(&[Is(Vindictus)], Field::I32(16)), Rule::new(&[Of(Source)], Field::U8(8))];

static ALLOWED_VERTS: &[Rule<Field>] = &[
	Rule::new(&[Is(Vindictus)], Field::U32(192)),
	Rule::new(&[Is(Source22)], Field::U32(140)),
	Rule::new(&[Is(Source23)], Field::U32(144)),
	Rule::new(&[Of(Source)], Field::U32(136)),
];

pub const ALLOWED_VERTS_LEN: usize = 10;

/// One half of an edge neighbor: a displacement touching part of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplacementSubNeighbor {
	/// Index of the neighboring displacement, `0xFFFF` if there is none.
	pub index: i32,
	pub orientation: i32,
	pub span: i32,
	pub neighbor_span: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplacementCornerNeighbor {
	pub indices: [i32; 4],
	/// How many of `indices` are used.
	pub count: i32,
}

raw_record!(
	/// A subdivided, displaced surface built on top of a face.
	Displacement,
	"Displacement",
	LENGTHS
);

impl Displacement {
	record_fields! {
		start_position, set_start_position: Vec3 = START_POSITION;
		/// Index of the first [`DisplacementVertex`].
		first_vertex, set_first_vertex: i32 = FIRST_VERTEX;
		/// Index of the first entry in the displacement triangle lump.
		first_triangle, set_first_triangle: i32 = FIRST_TRIANGLE;
		/// Subdivision level, usually 2 to 4.
		power, set_power: i32 = POWER;
		min_tesselation, set_min_tesselation: i32 = MIN_TESSELATION;
		smoothing_angle, set_smoothing_angle: f32 = SMOOTHING_ANGLE;
		contents, set_contents: i32 = CONTENTS;
		face, set_face: i32 = FACE;
		lightmap_alpha_start, set_lightmap_alpha_start: i32 = LIGHTMAP_ALPHA_START;
		lightmap_sample_position_start, set_lightmap_sample_position_start: i32 = LIGHTMAP_SAMPLE_POSITION_START;
	}

	/// Vertices per side, `2^power + 1`.
	fn side_vertices(&self) -> Option<i64> {
		Some(1_i64.checked_shl(u32::try_from(self.power()?).ok()?)? + 1)
	}

	/// `(2^power + 1)^2`
	pub fn num_vertices(&self) -> Option<i64> {
		let side = self.side_vertices()?;
		side.checked_mul(side)
	}

	/// `2 * (2^power)^2`
	pub fn num_triangles(&self) -> Option<i64> {
		let side = self.side_vertices()? - 1;
		side.checked_mul(side)?.checked_mul(2)
	}

	fn sub_neighbor_base(&self, edge: usize, sub: usize) -> Option<usize> {
		if edge >= 4 || sub >= 2 {
			return None;
		}
		let len = select(SUB_NEIGHBOR_LEN, self.raw.ctx(), 0)?;
		Some(NEIGHBORS_START + (edge * 2 + sub) * len)
	}

	/// Half `sub` (0 or 1) of the neighbor along `edge` (0 to 3).
	pub fn sub_neighbor(&self, edge: usize, sub: usize) -> Option<DisplacementSubNeighbor> {
		let base = self.sub_neighbor_base(edge, sub)?;
		Some(DisplacementSubNeighbor {
			index: self.raw.get_at(SUB_NEIGHBOR_INDEX, base)?,
			orientation: self.raw.get_at(SUB_NEIGHBOR_ORIENTATION, base)?,
			span: self.raw.get_at(SUB_NEIGHBOR_SPAN, base)?,
			neighbor_span: self.raw.get_at(SUB_NEIGHBOR_NEIGHBOR_SPAN, base)?,
		})
	}

	pub fn set_sub_neighbor(&mut self, edge: usize, sub: usize, neighbor: DisplacementSubNeighbor) -> bool {
		let Some(base) = self.sub_neighbor_base(edge, sub) else { return false };
		self.raw.set_at(SUB_NEIGHBOR_INDEX, base, neighbor.index)
			&& self.raw.set_at(SUB_NEIGHBOR_ORIENTATION, base, neighbor.orientation)
			&& self.raw.set_at(SUB_NEIGHBOR_SPAN, base, neighbor.span)
			&& self.raw.set_at(SUB_NEIGHBOR_NEIGHBOR_SPAN, base, neighbor.neighbor_span)
	}

	fn corner_neighbor_base(&self, corner: usize) -> Option<usize> {
		if corner >= 4 {
			return None;
		}
		let ctx = self.raw.ctx();
		let edges_len = 8 * select(SUB_NEIGHBOR_LEN, ctx, 0)?;
		Some(NEIGHBORS_START + edges_len + corner * select(CORNER_NEIGHBOR_LEN, ctx, 0)?)
	}

	pub fn corner_neighbor(&self, corner: usize) -> Option<DisplacementCornerNeighbor> {
		let base = self.corner_neighbor_base(corner)?;
		let stride = self.raw.field(CORNER_NEIGHBOR_INDEX)?.width();
		let mut indices = [0; 4];
		for (i, index) in indices.iter_mut().enumerate() {
			*index = self.raw.get_at(CORNER_NEIGHBOR_INDEX, base + i * stride)?;
		}
		Some(DisplacementCornerNeighbor {
			indices,
			count: self.raw.get_at(CORNER_NEIGHBOR_COUNT, base)?,
		})
	}

	pub fn set_corner_neighbor(&mut self, corner: usize, neighbor: DisplacementCornerNeighbor) -> bool {
		let (Some(base), Some(field)) = (self.corner_neighbor_base(corner), self.raw.field(CORNER_NEIGHBOR_INDEX)) else {
			return false;
		};
		let stride = field.width();
		for (i, index) in neighbor.indices.into_iter().enumerate() {
			if !self.raw.set_at(CORNER_NEIGHBOR_INDEX, base + i * stride, index) {
				return false;
			}
		}
		self.raw.set_at(CORNER_NEIGHBOR_COUNT, base, neighbor.count)
	}

	/// Bitfield of which vertices may be removed when tesselating. Words that don't fit in the record read as 0.
	pub fn allowed_vertices(&self) -> Option<[u32; ALLOWED_VERTS_LEN]> {
		self.raw.field(ALLOWED_VERTS)?;
		let mut words = [0; ALLOWED_VERTS_LEN];
		for (i, word) in words.iter_mut().enumerate() {
			*word = self.raw.get_at(ALLOWED_VERTS, i * 4).unwrap_or(0);
		}
		Some(words)
	}

	/// Returns `false` if the variant has no bitfield, or it was only partially written.
	pub fn set_allowed_vertices(&mut self, words: [u32; ALLOWED_VERTS_LEN]) -> bool {
		let mut all = true;
		for (i, word) in words.into_iter().enumerate() {
			all &= self.raw.set_at(ALLOWED_VERTS, i * 4, word);
		}
		all
	}

	fn copy_fields(&self, to: &mut Self) {
		self.copy_record_fields(to);
		for edge in 0..4 {
			for sub in 0..2 {
				if let Some(neighbor) = self.sub_neighbor(edge, sub) {
					to.set_sub_neighbor(edge, sub, neighbor);
				}
			}
		}
		for corner in 0..4 {
			if let Some(neighbor) = self.corner_neighbor(corner) {
				to.set_corner_neighbor(corner, neighbor);
			}
		}
		if let Some(words) = self.allowed_vertices() {
			to.set_allowed_vertices(words);
		}
	}
}

impl LumpRange<DisplacementVertex> for Displacement {
	fn first_index(&self) -> Option<i64> {
		self.first_vertex().map(i64::from)
	}

	fn count(&self) -> Option<i64> {
		self.num_vertices()
	}
}

impl LumpRange<DisplacementTriangles> for Displacement {
	fn first_index(&self) -> Option<i64> {
		self.first_triangle().map(i64::from)
	}

	fn count(&self) -> Option<i64> {
		self.num_triangles()
	}
}

static VERTEX_LENGTHS: &[Rule<usize>] = &[Rule::new(&[Of(Source)], 20)];
static VERTEX_NORMAL: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::Vec3(0))];
static VERTEX_DISTANCE: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::F32(12))];
static VERTEX_ALPHA: &[Rule<Field>] = &[Rule::new(&[Of(Source)], Field::F32(16))];

raw_record!(
	/// Offset of one displacement vertex from its position on the flat base face.
	DisplacementVertex,
	"DisplacementVertex",
	VERTEX_LENGTHS
);

impl DisplacementVertex {
	record_fields! {
		/// Direction of the offset.
		normal, set_normal: Vec3 = VERTEX_NORMAL;
		/// Length of the offset.
		distance, set_distance: f32 = VERTEX_DISTANCE;
		/// Blend between the two materials of the displacement.
		alpha, set_alpha: f32 = VERTEX_ALPHA;
	}

	/// `normal * distance`
	pub fn offset(&self) -> Option<Vec3> {
		Some(self.normal()? * self.distance()?)
	}

	fn copy_fields(&self, to: &mut Self) {
		self.copy_record_fields(to);
	}
}

/// The per-triangle flags lump of displacements. Stored as a [`NumList`], so this only marks the target of a [`LumpRange`].
#[derive(Debug, Clone, Copy)]
pub struct DisplacementTriangles;

impl LumpTarget for DisplacementTriangles {
	type Element = i64;
	const KIND: LumpKind = LumpKind::DisplacementTriangles;

	fn elements(data: &LumpData) -> Option<&[Self::Element]> {
		match data {
			LumpData::Numbers(list) => Some(list.values.as_slice()),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::lump::{LumpContext, LumpObject};

	fn displacement(map_type: MapType) -> Displacement {
		Displacement::new(LumpContext::of(map_type)).unwrap()
	}

	#[test]
	fn record_lengths() {
		assert_eq!(displacement(MapType::Source20).as_bytes().len(), 176);
		assert_eq!(displacement(MapType::Source23).as_bytes().len(), 184);
		assert_eq!(displacement(MapType::Vindictus).as_bytes().len(), 232);
		assert!(Displacement::new(LumpContext::of(MapType::Quake3)).is_err());
	}

	#[test]
	fn element_counts() {
		let mut disp = displacement(MapType::Source20);
		disp.set_power(3);
		assert_eq!(disp.num_vertices(), Some(81));
		assert_eq!(disp.num_triangles(), Some(128));
		assert_eq!(LumpRange::<DisplacementVertex>::count(&disp), Some(81));
		assert_eq!(LumpRange::<DisplacementTriangles>::count(&disp), Some(128));

		disp.set_power(-1);
		assert_eq!(disp.num_vertices(), None);
	}

	#[test]
	fn neighbor_offsets() {
		let mut disp = displacement(MapType::Source20);
		let neighbor = DisplacementSubNeighbor {
			index: 7,
			orientation: 1,
			span: 2,
			neighbor_span: 3,
		};
		assert!(disp.set_sub_neighbor(1, 1, neighbor));
		// Edge 1, second half: 48 + 3 * 6
		assert_eq!(&disp.as_bytes()[66..71], &[7, 0, 1, 2, 3]);
		assert_eq!(disp.sub_neighbor(1, 1), Some(neighbor));
		assert_eq!(disp.sub_neighbor(4, 0), None);

		let corner = DisplacementCornerNeighbor {
			indices: [1, 2, 3, -1],
			count: 3,
		};
		assert!(disp.set_corner_neighbor(2, corner));
		// 48 + 8 * 6 + 2 * 10
		assert_eq!(&disp.as_bytes()[116..118], &[1, 0]);
		assert_eq!(disp.as_bytes()[124], 3);
		assert_eq!(disp.corner_neighbor(2), Some(corner));
	}

	#[test]
	fn vindictus_conversion() {
		let mut source = displacement(MapType::Source20);
		source.set_face(65000);
		source.set_power(2);
		source.set_sub_neighbor(
			0,
			0,
			DisplacementSubNeighbor {
				index: 4,
				orientation: 2,
				span: 1,
				neighbor_span: 1,
			},
		);
		source.set_corner_neighbor(
			3,
			DisplacementCornerNeighbor {
				indices: [9, 0, 0, 0],
				count: 1,
			},
		);
		let mut words = [0; ALLOWED_VERTS_LEN];
		words[9] = 0xDEADBEEF;
		assert!(source.set_allowed_vertices(words));
		assert_eq!(&source.as_bytes()[172..176], &0xDEADBEEF_u32.to_le_bytes());

		let vindictus = source.convert(LumpContext::of(MapType::Vindictus)).unwrap();
		assert_eq!(vindictus.face(), Some(65000));
		assert_eq!(vindictus.power(), Some(2));
		assert_eq!(vindictus.sub_neighbor(0, 0).map(|n| n.orientation), Some(2));
		assert_eq!(vindictus.corner_neighbor(3).map(|n| n.indices[0]), Some(9));
		// 48 + 8 * 8 + 3 * 20
		assert_eq!(&vindictus.as_bytes()[172..176], &9_i32.to_le_bytes());
		assert_eq!(vindictus.allowed_vertices(), Some(words));
		assert_eq!(&vindictus.as_bytes()[228..232], &0xDEADBEEF_u32.to_le_bytes());
	}

	#[test]
	fn vertex_offset() {
		let mut vertex = DisplacementVertex::new(LumpContext::of(MapType::Source20)).unwrap();
		vertex.set_normal(Vec3::Z);
		vertex.set_distance(4.0);
		vertex.set_alpha(0.5);
		assert_eq!(vertex.offset(), Some(Vec3::new(0.0, 0.0, 4.0)));
		assert_eq!(vertex.as_bytes().len(), 20);
		assert_eq!(&vertex.as_bytes()[16..], &0.5_f32.to_le_bytes());
	}
}
