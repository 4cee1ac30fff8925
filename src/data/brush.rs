//! Brushes and the sides bounding them.

use crate::{
	layout::{raw_record, record_fields, Family::*, Field, Rule},
	lump::LumpRange,
	map_type::MapType::*,
};

static BRUSH_LENGTHS: &[Rule<usize>] = &[
	Rule::new(&[Of(CoD)], 4),
	Rule::new(&[Of(Quake2), Of(Quake3), Is(Nightfire), Of(Source)], 12),
];

static BRUSH_FIRST_SIDE: &[Rule<Field>] = &[
	Rule::new(&[Is(Nightfire), Is(STEF2)], Field::I32(4)),
	Rule::new(&[Of(Quake2), OfExcept(Quake3, CoD), Of(Source)], Field::I32(0)),
];

static BRUSH_NUM_SIDES: &[Rule<Field>] = &[
	Rule::new(&[Of(CoD)], Field::I16(0)),
	Rule::new(&[Is(STEF2)], Field::I32(0)),
	Rule::new(&[Is(Nightfire)], Field::I32(8)),
	Rule::new(&[Of(Quake2), Of(Quake3), Of(Source)], Field::I32(4)),
];

static BRUSH_TEXTURE: &[Rule<Field>] = &[Rule::new(&[Of(CoD)], Field::I16(2)), Rule::new(&[Of(Quake3)], Field::I32(8))];

static BRUSH_CONTENTS: &[Rule<Field>] = &[
	Rule::new(&[Is(Nightfire)], Field::I32(0)),
	Rule::new(&[Of(Quake2), Of(Source)], Field::I32(8)),
];

raw_record!(
	/// A convex volume, bounded by a run of [`BrushSide`]s.
	Brush,
	"Brush",
	BRUSH_LENGTHS
);

impl Brush {
	record_fields! {
		/// Index of this brush's first side. CoD brushes don't store one, their sides follow on from the previous brush's.
		first_side, set_first_side: i32 = BRUSH_FIRST_SIDE;
		num_sides, set_num_sides: i32 = BRUSH_NUM_SIDES;
		/// Index into the texture or shader lump.
		texture, set_texture: i32 = BRUSH_TEXTURE;
		contents, set_contents: i32 = BRUSH_CONTENTS;
	}

	fn copy_fields(&self, to: &mut Self) {
		self.copy_record_fields(to);
	}
}

impl LumpRange<BrushSide> for Brush {
	fn first_index(&self) -> Option<i64> {
		self.first_side().map(i64::from)
	}

	fn count(&self) -> Option<i64> {
		self.num_sides().map(i64::from)
	}
}

static SIDE_LENGTHS: &[Rule<usize>] = &[
	Rule::new(&[Is(Vindictus)], 16),
	Rule::new(&[Of(MOHAA), Is(Raven)], 12),
	Rule::new(&[Of(Quake3), Of(Source), Is(SiN), Is(Nightfire)], 8),
	Rule::new(&[Of(Quake2)], 4),
];

static SIDE_PLANE: &[Rule<Field>] = &[
	Rule::new(&[Is(STEF2), Is(Nightfire)], Field::I32(4)),
	Rule::new(&[Of(Quake3), Is(Vindictus)], Field::I32(0)),
	Rule::new(&[Of(Quake2), Of(Source)], Field::U16(0)),
];

static SIDE_DISTANCE: &[Rule<Field>] = &[Rule::new(&[Of(CoD)], Field::F32(0))];

static SIDE_TEXTURE: &[Rule<Field>] = &[
	Rule::new(&[Is(STEF2)], Field::I32(0)),
	Rule::new(&[Of(Quake3), Is(Vindictus)], Field::I32(4)),
	Rule::new(&[Of(Quake2), Of(Source)], Field::I16(2)),
];

static SIDE_FACE: &[Rule<Field>] = &[Rule::new(&[Is(Nightfire)], Field::I32(0)), Rule::new(&[Is(Raven)], Field::I32(8))];

static SIDE_DISPLACEMENT: &[Rule<Field>] = &[Rule::new(&[Is(Vindictus)], Field::I32(8)), Rule::new(&[Of(Source)], Field::I16(4))];

static SIDE_BEVEL: &[Rule<Field>] = &[Rule::new(&[Is(Vindictus)], Field::U8(12)), Rule::new(&[Of(Source)], Field::U8(6))];

static SIDE_THIN: &[Rule<Field>] = &[Rule::new(&[OfExcept(Source, Vindictus)], Field::U8(7))];

raw_record!(
	/// One bounding plane of a [`Brush`].
	BrushSide,
	"BrushSide",
	SIDE_LENGTHS
);

impl BrushSide {
	record_fields! {
		plane, set_plane: i32 = SIDE_PLANE;
		/// CoD stores the plane distance in place of a plane index.
		distance, set_distance: f32 = SIDE_DISTANCE;
		texture, set_texture: i32 = SIDE_TEXTURE;
		face, set_face: i32 = SIDE_FACE;
		displacement, set_displacement: i32 = SIDE_DISPLACEMENT;
		bevel, set_bevel: bool = SIDE_BEVEL;
		thin, set_thin: bool = SIDE_THIN;
	}

	fn copy_fields(&self, to: &mut Self) {
		self.copy_record_fields(to);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		lump::{LumpContext, LumpObject},
		map_type::MapType,
		reader::BspByteWriter,
	};

	fn brush(map_type: MapType, bytes: &[u8]) -> Brush {
		Brush::parse(bytes, LumpContext::of(map_type)).unwrap()
	}

	#[test]
	fn brush_layouts() {
		let mut bytes = Vec::new();
		for value in [3_i32, 5, 7] {
			bytes.extend(value.to_le_bytes());
		}

		let quake3 = brush(MapType::Quake3, &bytes);
		assert_eq!((quake3.first_side(), quake3.num_sides(), quake3.texture()), (Some(3), Some(5), Some(7)));
		assert_eq!(quake3.contents(), None);

		let source = brush(MapType::Source20, &bytes);
		assert_eq!((source.first_side(), source.num_sides(), source.contents()), (Some(3), Some(5), Some(7)));

		let nightfire = brush(MapType::Nightfire, &bytes);
		assert_eq!((nightfire.contents(), nightfire.first_side(), nightfire.num_sides()), (Some(3), Some(5), Some(7)));

		let stef2 = brush(MapType::STEF2, &bytes);
		assert_eq!((stef2.num_sides(), stef2.first_side()), (Some(3), Some(5)));

		let cod = brush(MapType::CoD2, &[6, 0, 0xFF, 0xFF]);
		assert_eq!((cod.num_sides(), cod.texture()), (Some(6), Some(-1)));
		assert_eq!(cod.first_side(), None);
	}

	#[test]
	fn unsupported_variants() {
		assert!(Brush::struct_len(LumpContext::of(MapType::Quake)).is_err());
		assert!(Brush::new(LumpContext::of(MapType::GoldSrc)).is_err());
		assert_eq!(BrushSide::struct_len(LumpContext::of(MapType::SiN)).unwrap(), 8);
		assert_eq!(BrushSide::struct_len(LumpContext::of(MapType::Daikatana)).unwrap(), 4);
	}

	#[test]
	fn absent_fields_read_none() {
		let side = BrushSide::new(LumpContext::of(MapType::Quake2)).unwrap();
		assert_eq!(side.face(), None);
		assert_eq!(side.displacement(), None);
		assert_eq!(side.distance(), None);

		let mut brush = Brush::new(LumpContext::of(MapType::CoD)).unwrap();
		assert!(!brush.set_first_side(4));
		assert_eq!(brush.as_bytes(), &[0; 4]);
	}

	#[test]
	fn cod_brush_into_source() {
		let mut cod = Brush::new(LumpContext::of(MapType::CoD)).unwrap();
		assert!(cod.set_num_sides(6));
		assert!(cod.set_texture(2));

		let ctx = LumpContext::of(MapType::Source20);
		let mut source = cod.convert(ctx).unwrap();
		assert_eq!(source.as_bytes().len(), 12);
		assert_eq!(source.num_sides(), Some(6));
		// Nothing to derive it from.
		assert_eq!(source.first_side(), Some(0));
		assert!(source.set_first_side(10));

		let mut writer = BspByteWriter::new();
		source.write(ctx, &mut writer).unwrap();
		let reparsed = Brush::parse(writer.as_bytes(), ctx).unwrap();
		assert_eq!((reparsed.first_side(), reparsed.num_sides()), (Some(10), Some(6)));

		// And back, where only the side count survives.
		let back = reparsed.convert(LumpContext::of(MapType::CoD)).unwrap();
		assert_eq!(back.as_bytes(), &[6, 0, 0, 0]);
	}

	#[test]
	fn writing_converts() {
		let mut side = BrushSide::new(LumpContext::of(MapType::Source20)).unwrap();
		side.set_plane(40000);
		side.set_texture(3);
		side.set_bevel(true);

		let mut writer = BspByteWriter::new();
		side.write(LumpContext::of(MapType::Vindictus), &mut writer).unwrap();
		let vindictus = BrushSide::parse(writer.as_bytes(), LumpContext::of(MapType::Vindictus)).unwrap();
		assert_eq!(writer.as_bytes().len(), 16);
		assert_eq!(vindictus.plane(), Some(40000));
		assert_eq!(vindictus.texture(), Some(3));
		assert_eq!(vindictus.bevel(), Some(true));
		assert_eq!(vindictus.thin(), None);
	}

	#[test]
	fn source_side_widths() {
		let side = BrushSide::parse(&[0x40, 0x9C, 0xFE, 0xFF, 2, 0, 1, 1], LumpContext::of(MapType::L4D2)).unwrap();
		assert_eq!(side.plane(), Some(40000));
		assert_eq!(side.texture(), Some(-2));
		assert_eq!(side.displacement(), Some(2));
		assert_eq!(side.bevel(), Some(true));
		assert_eq!(side.thin(), Some(true));
	}
}
