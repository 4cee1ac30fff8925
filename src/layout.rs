//! Data-driven record layouts.
//!
//! Every variant-dependent decision (which slot a lump lives in, how long a record is, where a field sits inside it) is an ordered table
//! of [`Rule`]s. The first rule whose [`Family`] list, version list and record length all match wins, so more specific variants must be
//! listed before the families containing them.

use crate::{lump::LumpContext, map_type::MapType, prelude::*};

/// A predicate over [`MapType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
	/// Exactly this map type.
	Is(MapType),
	/// This map type or any of its subtypes.
	Of(MapType),
	/// A subtype of the first, but not of the second.
	OfExcept(MapType, MapType),
}

impl Family {
	#[inline]
	pub const fn matches(self, map_type: MapType) -> bool {
		match self {
			Self::Is(family) => map_type.bits() == family.bits(),
			Self::Of(family) => map_type.is_subtype_of(family),
			Self::OfExcept(family, except) => map_type.is_subtype_of(family) && !map_type.is_subtype_of(except),
		}
	}
}

/// One branch of a dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct Rule<T: 'static> {
	/// Matches if any of these match.
	pub families: &'static [Family],
	/// Lump versions this rule applies to, `None` for all of them.
	pub versions: Option<&'static [i32]>,
	/// Record byte length this rule applies to, `None` for any.
	pub len: Option<usize>,
	pub value: T,
}

impl<T: Copy> Rule<T> {
	pub const fn new(families: &'static [Family], value: T) -> Self {
		Self {
			families,
			versions: None,
			len: None,
			value,
		}
	}

	pub const fn versioned(families: &'static [Family], versions: &'static [i32], value: T) -> Self {
		Self {
			families,
			versions: Some(versions),
			len: None,
			value,
		}
	}

	/// Only matches records of exactly `len` bytes.
	pub const fn sized(families: &'static [Family], versions: &'static [i32], len: usize, value: T) -> Self {
		Self {
			families,
			versions: Some(versions),
			len: Some(len),
			value,
		}
	}

	pub fn matches(&self, ctx: LumpContext, len: usize) -> bool {
		self.families.iter().any(|family| family.matches(ctx.map_type))
			&& self.versions.is_none_or(|versions| versions.contains(&ctx.version))
			&& self.len.is_none_or(|rule_len| rule_len == len)
	}
}

/// Returns the value of the first matching rule. `len` is the byte length of the record being inspected, only consulted by
/// [`Rule::sized`] rules.
pub fn select<T: Copy>(rules: &[Rule<T>], ctx: LumpContext, len: usize) -> Option<T> {
	rules.iter().find(|rule| rule.matches(ctx, len)).map(|rule| rule.value)
}

/// Where a field lives inside a record, and how it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
	U8(usize),
	I16(usize),
	U16(usize),
	I32(usize),
	U32(usize),
	F32(usize),
	/// Three consecutive `f32`s.
	Vec3(usize),
	/// Four bytes, in RGBA order.
	Rgba(usize),
}

impl Field {
	pub const fn offset(self) -> usize {
		match self {
			Self::U8(offset)
			| Self::I16(offset)
			| Self::U16(offset)
			| Self::I32(offset)
			| Self::U32(offset)
			| Self::F32(offset)
			| Self::Vec3(offset)
			| Self::Rgba(offset) => offset,
		}
	}

	pub const fn width(self) -> usize {
		match self {
			Self::U8(_) => 1,
			Self::I16(_) | Self::U16(_) => 2,
			Self::I32(_) | Self::U32(_) | Self::F32(_) | Self::Rgba(_) => 4,
			Self::Vec3(_) => 12,
		}
	}

	/// The same field, moved `by` bytes further into the record. Used for repeated sub-structures.
	pub const fn shifted(self, by: usize) -> Self {
		match self {
			Self::U8(offset) => Self::U8(offset + by),
			Self::I16(offset) => Self::I16(offset + by),
			Self::U16(offset) => Self::U16(offset + by),
			Self::I32(offset) => Self::I32(offset + by),
			Self::U32(offset) => Self::U32(offset + by),
			Self::F32(offset) => Self::F32(offset + by),
			Self::Vec3(offset) => Self::Vec3(offset + by),
			Self::Rgba(offset) => Self::Rgba(offset + by),
		}
	}

	fn bytes(self, data: &[u8]) -> Option<&[u8]> {
		data.get(self.offset()..self.offset() + self.width())
	}

	fn bytes_mut(self, data: &mut [u8]) -> Option<&mut [u8]> {
		data.get_mut(self.offset()..self.offset() + self.width())
	}
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
	let mut out = [0; N];
	out.copy_from_slice(&bytes[..N]);
	out
}

/// A value a [`Field`] can be read as or written from. Reading a field stored with an incompatible [`Field`] kind yields `None`.
pub trait FieldValue: Sized + Copy {
	fn read(data: &[u8], field: Field) -> Option<Self>;
	/// Returns `false` if the field didn't fit or has an incompatible kind.
	fn write(self, data: &mut [u8], field: Field) -> bool;
}

impl FieldValue for i32 {
	fn read(data: &[u8], field: Field) -> Option<Self> {
		let bytes = field.bytes(data)?;
		Some(match field {
			Field::U8(_) => bytes[0] as i32,
			Field::I16(_) => i16::from_le_bytes(array(bytes)) as i32,
			Field::U16(_) => u16::from_le_bytes(array(bytes)) as i32,
			Field::I32(_) => i32::from_le_bytes(array(bytes)),
			Field::U32(_) => u32::from_le_bytes(array(bytes)) as i32,
			_ => return None,
		})
	}

	fn write(self, data: &mut [u8], field: Field) -> bool {
		let Some(bytes) = field.bytes_mut(data) else { return false };
		match field {
			Field::U8(_) => bytes[0] = self as u8,
			Field::I16(_) | Field::U16(_) => bytes.copy_from_slice(&(self as u16).to_le_bytes()),
			Field::I32(_) | Field::U32(_) => bytes.copy_from_slice(&self.to_le_bytes()),
			_ => return false,
		}
		true
	}
}

impl FieldValue for u32 {
	fn read(data: &[u8], field: Field) -> Option<Self> {
		i32::read(data, field).map(|value| value as u32)
	}

	fn write(self, data: &mut [u8], field: Field) -> bool {
		(self as i32).write(data, field)
	}
}

impl FieldValue for u8 {
	fn read(data: &[u8], field: Field) -> Option<Self> {
		match field {
			Field::U8(_) => field.bytes(data).map(|bytes| bytes[0]),
			_ => None,
		}
	}

	fn write(self, data: &mut [u8], field: Field) -> bool {
		match (field, field.bytes_mut(data)) {
			(Field::U8(_), Some(bytes)) => {
				bytes[0] = self;
				true
			}
			_ => false,
		}
	}
}

impl FieldValue for bool {
	fn read(data: &[u8], field: Field) -> Option<Self> {
		u8::read(data, field).map(|value| value != 0)
	}

	fn write(self, data: &mut [u8], field: Field) -> bool {
		(self as u8).write(data, field)
	}
}

impl FieldValue for f32 {
	fn read(data: &[u8], field: Field) -> Option<Self> {
		match field {
			Field::F32(_) => field.bytes(data).map(|bytes| f32::from_le_bytes(array(bytes))),
			_ => None,
		}
	}

	fn write(self, data: &mut [u8], field: Field) -> bool {
		match (field, field.bytes_mut(data)) {
			(Field::F32(_), Some(bytes)) => {
				bytes.copy_from_slice(&self.to_le_bytes());
				true
			}
			_ => false,
		}
	}
}

impl FieldValue for Vec3 {
	fn read(data: &[u8], field: Field) -> Option<Self> {
		let Field::Vec3(offset) = field else { return None };
		Some(Vec3::new(
			f32::read(data, Field::F32(offset))?,
			f32::read(data, Field::F32(offset + 4))?,
			f32::read(data, Field::F32(offset + 8))?,
		))
	}

	fn write(self, data: &mut [u8], field: Field) -> bool {
		let Field::Vec3(offset) = field else { return false };
		if field.bytes(data).is_none() {
			return false;
		}
		self.x.write(data, Field::F32(offset)) && self.y.write(data, Field::F32(offset + 4)) && self.z.write(data, Field::F32(offset + 8))
	}
}

/// RGBA color bytes.
impl FieldValue for [u8; 4] {
	fn read(data: &[u8], field: Field) -> Option<Self> {
		match field {
			Field::Rgba(_) => field.bytes(data).map(array),
			_ => None,
		}
	}

	fn write(self, data: &mut [u8], field: Field) -> bool {
		match (field, field.bytes_mut(data)) {
			(Field::Rgba(_), Some(bytes)) => {
				bytes.copy_from_slice(&self);
				true
			}
			_ => false,
		}
	}
}

/// The bytes of one fixed-size record, together with the variant and lump version they are laid out for.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
	ctx: LumpContext,
	data: Vec<u8>,
}

impl RawRecord {
	#[inline]
	pub fn new(ctx: LumpContext, data: Vec<u8>) -> Self {
		Self { ctx, data }
	}

	#[inline]
	pub fn zeroed(ctx: LumpContext, len: usize) -> Self {
		Self { ctx, data: vec![0; len] }
	}

	#[inline]
	pub fn ctx(&self) -> LumpContext {
		self.ctx
	}

	#[inline]
	pub fn data(&self) -> &[u8] {
		&self.data
	}

	#[inline]
	pub fn data_mut(&mut self) -> &mut [u8] {
		&mut self.data
	}

	/// Which [`Field`] the rules pick for this record, if any.
	#[inline]
	pub fn field(&self, rules: &[Rule<Field>]) -> Option<Field> {
		select(rules, self.ctx, self.data.len())
	}

	#[inline]
	pub fn get<T: FieldValue>(&self, rules: &[Rule<Field>]) -> Option<T> {
		self.get_at(rules, 0)
	}

	/// Like [`get`](Self::get), with the selected field moved `base` bytes into the record.
	pub fn get_at<T: FieldValue>(&self, rules: &[Rule<Field>], base: usize) -> Option<T> {
		T::read(&self.data, self.field(rules)?.shifted(base))
	}

	/// Returns `false` if the field doesn't exist for this record's variant and version.
	#[inline]
	pub fn set<T: FieldValue>(&mut self, rules: &[Rule<Field>], value: T) -> bool {
		self.set_at(rules, 0, value)
	}

	pub fn set_at<T: FieldValue>(&mut self, rules: &[Rule<Field>], base: usize, value: T) -> bool {
		match self.field(rules) {
			Some(field) => value.write(&mut self.data, field.shifted(base)),
			None => false,
		}
	}
}

/// Generates a getter returning `Option<T>` and a setter returning whether the field exists, for every listed field, plus a
/// `copy_record_fields` function that copies every listed field that exists in both records.
macro_rules! record_fields {
	($($(#[$meta:meta])* $get:ident, $set:ident: $ty:ty = $rules:expr;)*) => {
		$(
			$(#[$meta])*
			#[inline]
			pub fn $get(&self) -> Option<$ty> {
				self.raw.get($rules)
			}

			#[inline]
			pub fn $set(&mut self, value: $ty) -> bool {
				self.raw.set($rules, value)
			}
		)*

		fn copy_record_fields(&self, to: &mut Self) {
			$(
				if let Some(value) = self.$get() {
					to.$set(value);
				}
			)*
		}
	};
}
pub(crate) use record_fields;

/// Declares a record type backed by a [`RawRecord`] and implements [`LumpObject`](crate::lump::LumpObject) for it. The type must
/// provide `fn copy_fields(&self, to: &mut Self)`, used when converting between layouts.
macro_rules! raw_record {
	($(#[$meta:meta])* $name:ident, $display:literal, $lengths:expr) => {
		$(#[$meta])*
		#[derive(Debug, Clone, PartialEq)]
		pub struct $name {
			raw: $crate::layout::RawRecord,
		}

		impl $name {
			/// A zeroed record laid out for `ctx`.
			pub fn new(ctx: $crate::lump::LumpContext) -> $crate::BspResult<Self> {
				Ok(Self {
					raw: $crate::layout::RawRecord::zeroed(ctx, <Self as $crate::lump::LumpObject>::struct_len(ctx)?),
				})
			}

			/// The variant and lump version this record is laid out for.
			#[inline]
			pub fn context(&self) -> $crate::lump::LumpContext {
				self.raw.ctx()
			}

			#[inline]
			pub fn as_bytes(&self) -> &[u8] {
				self.raw.data()
			}
		}

		impl $crate::lump::LumpObject for $name {
			const NAME: &'static str = $display;

			fn struct_len(ctx: $crate::lump::LumpContext) -> $crate::BspResult<usize> {
				$crate::layout::select($lengths, ctx, 0).ok_or($crate::BspError::UnsupportedMapType {
					what: $display,
					map_type: ctx.map_type,
					version: ctx.version,
				})
			}

			fn parse(data: &[u8], ctx: $crate::lump::LumpContext) -> $crate::BspResult<Self> {
				Ok(Self {
					raw: $crate::layout::RawRecord::new(ctx, data.to_vec()),
				})
			}

			fn write(&self, ctx: $crate::lump::LumpContext, writer: &mut $crate::reader::BspByteWriter) -> $crate::BspResult<()> {
				if self.raw.ctx() == ctx {
					writer.write_bytes(self.raw.data());
				} else {
					writer.write_bytes(self.convert(ctx)?.raw.data());
				}
				Ok(())
			}

			fn convert(&self, ctx: $crate::lump::LumpContext) -> $crate::BspResult<Self> {
				if self.raw.ctx() == ctx {
					return Ok(self.clone());
				}
				let mut out = Self::new(ctx)?;
				self.copy_fields(&mut out);
				Ok(out)
			}
		}
	};
}
pub(crate) use raw_record;

#[cfg(test)]
mod tests {
	use super::*;
	use Family::*;

	static TABLE: &[Rule<Field>] = &[
		Rule::new(&[Is(MapType::Vindictus)], Field::I32(8)),
		Rule::versioned(&[Of(MapType::Source)], &[2], Field::I16(6)),
		Rule::new(&[OfExcept(MapType::Source, MapType::Source21)], Field::I16(4)),
		Rule::new(&[Of(MapType::Quake2), Of(MapType::Source)], Field::U16(0)),
	];

	fn ctx(map_type: MapType, version: i32) -> LumpContext {
		LumpContext { map_type, version }
	}

	#[test]
	fn first_match_wins() {
		assert_eq!(select(TABLE, ctx(MapType::Vindictus, 2), 0), Some(Field::I32(8)));
		assert_eq!(select(TABLE, ctx(MapType::Source20, 2), 0), Some(Field::I16(6)));
		assert_eq!(select(TABLE, ctx(MapType::Source20, 0), 0), Some(Field::I16(4)));
		assert_eq!(select(TABLE, ctx(MapType::L4D2, 0), 0), Some(Field::U16(0)));
		assert_eq!(select(TABLE, ctx(MapType::SoF, 0), 0), Some(Field::U16(0)));
		assert_eq!(select(TABLE, ctx(MapType::Quake3, 0), 0), None);
	}

	#[test]
	fn sized_rules() {
		static SIZED: &[Rule<Field>] = &[
			Rule::sized(&[Of(MapType::Source)], &[9], 76, Field::F32(40)),
			Rule::versioned(&[Of(MapType::Source)], &[9], Field::F32(36)),
		];
		assert_eq!(select(SIZED, ctx(MapType::Source20, 9), 76), Some(Field::F32(40)));
		assert_eq!(select(SIZED, ctx(MapType::Source20, 9), 72), Some(Field::F32(36)));
	}

	#[test]
	fn absent_fields_are_none() {
		let mut record = RawRecord::zeroed(ctx(MapType::Quake3, 0), 12);
		assert_eq!(record.get::<i32>(TABLE), None);
		assert!(!record.set(TABLE, 5_i32));
		assert_eq!(record.data(), &[0; 12]);
	}

	#[test]
	fn field_widths() {
		let mut record = RawRecord::zeroed(ctx(MapType::Source20, 0), 8);
		assert!(record.set(TABLE, -2_i32));
		assert_eq!(record.data(), &[0, 0, 0, 0, 0xFE, 0xFF, 0, 0]);
		assert_eq!(record.get::<i32>(TABLE), Some(-2));
		// Wrong value kind for the field.
		assert_eq!(record.get::<f32>(TABLE), None);
		// Doesn't fit.
		assert_eq!(record.get_at::<i32>(TABLE, 4), None);
	}
}
