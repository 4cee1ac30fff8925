//! Source texture data.

use crate::{
	layout::{raw_record, record_fields, Family::*, Field, Rule},
	map_type::MapType::*,
	prelude::*,
};

static LENGTHS: &[Rule<usize>] = &[Rule::new(&[Is(Titanfall)], 36), Rule::new(&[Of(Source)], 32)];

static REFLECTIVITY: &[Rule<Field>] = &[Rule::new(&[Of(Source), Is(Titanfall)], Field::Vec3(0))];
static STRING_TABLE_INDEX: &[Rule<Field>] = &[Rule::new(&[Of(Source), Is(Titanfall)], Field::I32(12))];
static WIDTH: &[Rule<Field>] = &[Rule::new(&[Of(Source), Is(Titanfall)], Field::I32(16))];
static HEIGHT: &[Rule<Field>] = &[Rule::new(&[Of(Source), Is(Titanfall)], Field::I32(20))];
static VIEW_WIDTH: &[Rule<Field>] = &[Rule::new(&[Of(Source), Is(Titanfall)], Field::I32(24))];
static VIEW_HEIGHT: &[Rule<Field>] = &[Rule::new(&[Of(Source), Is(Titanfall)], Field::I32(28))];
static FLAGS: &[Rule<Field>] = &[Rule::new(&[Is(Titanfall)], Field::I32(32))];

raw_record!(
	/// Size and reflectivity of a material, and where its name is.
	TextureData,
	"TextureData",
	LENGTHS
);

impl TextureData {
	record_fields! {
		/// Average color of the material, each channel in `0..=1`.
		reflectivity, set_reflectivity: Vec3 = REFLECTIVITY;
		/// Index into the [`TextureTable`](crate::lump::LumpKind::TextureTable) lump, which holds the byte offset of the material name.
		string_table_index, set_string_table_index: i32 = STRING_TABLE_INDEX;
		width, set_width: i32 = WIDTH;
		height, set_height: i32 = HEIGHT;
		view_width, set_view_width: i32 = VIEW_WIDTH;
		view_height, set_view_height: i32 = VIEW_HEIGHT;
		flags, set_flags: i32 = FLAGS;
	}

	/// Width and height, if this variant has them.
	pub fn size(&self) -> Option<IVec2> {
		Some(IVec2::new(self.width()?, self.height()?))
	}

	fn copy_fields(&self, to: &mut Self) {
		self.copy_record_fields(to);
	}
}
