//! Decoded lump collections, and the glue between lump slots and the types they decode into.

mod kind;

pub use kind::*;

use derive_more::{Deref, DerefMut, IntoIterator};

use crate::{
	data::{
		brush::{Brush, BrushSide},
		displacement::{Displacement, DisplacementVertex},
		entities::Entities,
		game_lump::GameLump,
		plane::Plane,
		texture::TextureData,
		vertex::Vertex,
	},
	prelude::*,
	reader::{BspByteReader, BspByteWriter, BspValue},
};

/// What a record's byte layout depends on: the map variant, and the version of the lump the record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LumpContext {
	pub map_type: MapType,
	pub version: i32,
}

impl LumpContext {
	#[inline]
	pub const fn new(map_type: MapType, version: i32) -> Self {
		Self { map_type, version }
	}

	/// A context with lump version 0, for tables that only depend on the variant.
	#[inline]
	pub const fn of(map_type: MapType) -> Self {
		Self { map_type, version: 0 }
	}
}

/// A fixed-length record stored in a lump.
pub trait LumpObject: Sized + Clone {
	/// Human-readable name, used in errors and logs.
	const NAME: &'static str;

	/// The byte length of one record under `ctx`. Errors if the record doesn't exist in that variant, or isn't of a fixed length.
	fn struct_len(ctx: LumpContext) -> BspResult<usize>;

	/// Decodes one record from exactly [`struct_len`](Self::struct_len) bytes.
	fn parse(data: &[u8], ctx: LumpContext) -> BspResult<Self>;

	/// Encodes this record laid out for `ctx`, converting it first if it was decoded under a different one.
	fn write(&self, ctx: LumpContext, writer: &mut BspByteWriter) -> BspResult<()>;

	/// Re-derives every field this record has into the layout of `ctx`. Fields that don't exist in the destination are dropped, fields
	/// that don't exist in the source are left zeroed.
	fn convert(&self, ctx: LumpContext) -> BspResult<Self>;
}

/// A [`LumpObject`] that has a [`LumpData`] variant of its own.
pub trait StoredLump: LumpObject {
	fn wrap(lump: Lump<Self>) -> LumpData;
	fn peel(data: &LumpData) -> Option<&Lump<Self>>;
	fn peel_mut(data: &mut LumpData) -> Option<&mut Lump<Self>>;
}

macro_rules! stored_lump {
	($ty:ty => $variant:ident) => {
		impl StoredLump for $ty {
			fn wrap(lump: Lump<Self>) -> LumpData {
				LumpData::$variant(lump)
			}
			fn peel(data: &LumpData) -> Option<&Lump<Self>> {
				match data {
					LumpData::$variant(lump) => Some(lump),
					_ => None,
				}
			}
			fn peel_mut(data: &mut LumpData) -> Option<&mut Lump<Self>> {
				match data {
					LumpData::$variant(lump) => Some(lump),
					_ => None,
				}
			}
		}
	};
}

stored_lump!(Plane => Planes);
stored_lump!(Vertex => Vertices);
stored_lump!(Vec3 => Vectors);
stored_lump!(Brush => Brushes);
stored_lump!(BrushSide => BrushSides);
stored_lump!(TextureData => TextureData);
stored_lump!(Displacement => Displacements);
stored_lump!(DisplacementVertex => DisplacementVertices);

/// Plain vectors, used for normal and patch vertex lumps.
impl LumpObject for Vec3 {
	const NAME: &'static str = "Vector";

	fn struct_len(_ctx: LumpContext) -> BspResult<usize> {
		Ok(Vec3::bsp_struct_size())
	}

	fn parse(data: &[u8], _ctx: LumpContext) -> BspResult<Self> {
		BspByteReader::new(data).read()
	}

	fn write(&self, _ctx: LumpContext, writer: &mut BspByteWriter) -> BspResult<()> {
		writer.write(self);
		Ok(())
	}

	fn convert(&self, _ctx: LumpContext) -> BspResult<Self> {
		Ok(*self)
	}
}

/// An ordered run of records decoded from one lump. A record's identity is its index.
#[derive(Debug, Clone, PartialEq, Deref, DerefMut, IntoIterator)]
pub struct Lump<T> {
	#[deref]
	#[deref_mut]
	#[into_iterator(owned, ref, ref_mut)]
	pub items: Vec<T>,
	/// The layout the records were decoded with.
	pub ctx: LumpContext,
	/// Trailing bytes that didn't make up a whole record. Written back as long as the layout stays the same.
	pub remainder: Vec<u8>,
}

impl<T: LumpObject> Lump<T> {
	pub fn new(ctx: LumpContext) -> Self {
		Self::from_items(Vec::new(), ctx)
	}

	pub fn from_items(items: Vec<T>, ctx: LumpContext) -> Self {
		Self {
			items,
			ctx,
			remainder: Vec::new(),
		}
	}

	/// Splits `data` into records of [`LumpObject::struct_len`] bytes. Trailing bytes that don't make up a whole record are kept in
	/// [`remainder`](Self::remainder).
	pub fn parse(data: &[u8], ctx: LumpContext) -> BspResult<Self> {
		let struct_len = T::struct_len(ctx)?;
		if struct_len == 0 {
			return Ok(Self::new(ctx));
		}

		let chunks = data.chunks_exact(struct_len);
		let remainder = chunks.remainder().to_vec();
		if !remainder.is_empty() {
			log::warn!(
				"{} lump of {} bytes isn't a multiple of the record length {struct_len}, keeping {} trailing bytes",
				T::NAME,
				data.len(),
				remainder.len()
			);
		}

		let items = chunks
			.enumerate()
			.map(|(i, chunk)| T::parse(chunk, ctx).job(|| format!("Parsing {} lump entry {i}", T::NAME)))
			.collect::<BspResult<Vec<T>>>()?;

		Ok(Self { items, ctx, remainder })
	}

	/// Encodes every record laid out for `ctx`. The [`remainder`](Self::remainder) is only kept if `ctx` is the layout it was
	/// decoded with.
	pub fn to_bytes(&self, ctx: LumpContext) -> BspResult<Vec<u8>> {
		let mut writer = BspByteWriter::with_capacity(self.items.len() * T::struct_len(ctx)? + self.remainder.len());
		for (i, item) in self.items.iter().enumerate() {
			item.write(ctx, &mut writer).job(|| format!("Writing {} lump entry {i}", T::NAME))?;
		}
		if ctx == self.ctx {
			writer.write_bytes(&self.remainder);
		}
		Ok(writer.into_bytes())
	}

	/// Indexes the lump, erroring instead of returning `None` for out of bounds indices.
	pub fn get_checked(&self, index: i64) -> BspResult<&T> {
		usize::try_from(index).ok().and_then(|i| self.items.get(i)).ok_or(BspError::IndexOutOfBounds {
			lump: T::NAME,
			index,
			len: self.items.len(),
		})
	}
}

/// Element width of a [`NumList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NumType {
	I8,
	#[default]
	U8,
	I16,
	U16,
	I32,
	U32,
	I64,
}

impl NumType {
	pub const fn width(self) -> usize {
		match self {
			Self::I8 | Self::U8 => 1,
			Self::I16 | Self::U16 => 2,
			Self::I32 | Self::U32 => 4,
			Self::I64 => 8,
		}
	}

	fn read(self, reader: &mut BspByteReader) -> BspResult<i64> {
		Ok(match self {
			Self::I8 => reader.read::<i8>()? as i64,
			Self::U8 => reader.read::<u8>()? as i64,
			Self::I16 => reader.read::<i16>()? as i64,
			Self::U16 => reader.read::<u16>()? as i64,
			Self::I32 => reader.read::<i32>()? as i64,
			Self::U32 => reader.read::<u32>()? as i64,
			Self::I64 => reader.read::<i64>()?,
		})
	}

	/// Writes `value` truncated to this width.
	fn write(self, value: i64, writer: &mut BspByteWriter) {
		match self {
			Self::I8 | Self::U8 => writer.write(&(value as u8)),
			Self::I16 | Self::U16 => writer.write(&(value as u16)),
			Self::I32 | Self::U32 => writer.write(&(value as u32)),
			Self::I64 => writer.write(&value),
		}
	}
}

/// A lump of plain integers, whose width depends on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deref, DerefMut)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NumList {
	pub ty: NumType,
	#[deref]
	#[deref_mut]
	pub values: Vec<i64>,
	/// Trailing bytes that didn't make up a whole number. Written back as long as the width stays the same.
	pub remainder: Vec<u8>,
}

impl NumList {
	pub fn new(ty: NumType) -> Self {
		Self {
			ty,
			values: Vec::new(),
			remainder: Vec::new(),
		}
	}

	pub fn parse(data: &[u8], ty: NumType) -> BspResult<Self> {
		let count = data.len() / ty.width();
		let remainder = data[count * ty.width()..].to_vec();
		if !remainder.is_empty() {
			log::warn!("Number lump of {} bytes isn't a multiple of {}, keeping {} trailing bytes", data.len(), ty.width(), remainder.len());
		}

		let mut reader = BspByteReader::new(data);
		let mut values = Vec::with_capacity(count);
		for i in 0..count {
			values.push(ty.read(&mut reader).job(|| format!("Reading number {i}"))?);
		}
		Ok(Self { ty, values, remainder })
	}

	/// Encodes every value with width `ty`, which doesn't have to be the width the list was decoded with.
	pub fn to_bytes(&self, ty: NumType) -> Vec<u8> {
		let mut writer = BspByteWriter::with_capacity(self.values.len() * ty.width());
		for value in &self.values {
			ty.write(*value, &mut writer);
		}
		if ty == self.ty {
			writer.write_bytes(&self.remainder);
		}
		writer.into_bytes()
	}
}

/// A decoded lump. Which variant a slot decodes into is decided by its [`LumpKind`].
#[derive(Debug, Clone)]
pub enum LumpData {
	Entities(Entities),
	Planes(Lump<Plane>),
	Vertices(Lump<Vertex>),
	/// Normals and patch vertices.
	Vectors(Lump<Vec3>),
	Brushes(Lump<Brush>),
	BrushSides(Lump<BrushSide>),
	TextureData(Lump<TextureData>),
	Displacements(Lump<Displacement>),
	DisplacementVertices(Lump<DisplacementVertex>),
	Numbers(NumList),
	GameLump(GameLump),
	/// Lumps this crate doesn't interpret, like visibility and lightmap data.
	Raw(Vec<u8>),
}

impl LumpData {
	/// Decodes `data` as `kind`. Game lumps need their directory entry, and are decoded by [`GameLump::parse`] instead.
	pub fn parse(kind: LumpKind, data: &[u8], ctx: LumpContext) -> BspResult<Self> {
		Ok(match kind {
			LumpKind::Entities => Self::Entities(Entities::parse(data)?),
			LumpKind::Planes => Self::Planes(Lump::parse(data, ctx)?),
			LumpKind::Vertices => Self::Vertices(Lump::parse(data, ctx)?),
			LumpKind::Normals | LumpKind::PatchVertices => Self::Vectors(Lump::parse(data, ctx)?),
			LumpKind::Brushes => Self::Brushes(Lump::parse(data, ctx)?),
			LumpKind::BrushSides => Self::BrushSides(Lump::parse(data, ctx)?),
			LumpKind::TextureData => Self::TextureData(Lump::parse(data, ctx)?),
			LumpKind::Displacements => Self::Displacements(Lump::parse(data, ctx)?),
			LumpKind::DisplacementVertices => Self::DisplacementVertices(Lump::parse(data, ctx)?),
			LumpKind::GameLump => {
				return Err(BspError::VariableLengthLump("Game"));
			}
			LumpKind::Visibility | LumpKind::Lightmaps => Self::Raw(data.to_vec()),
			_ => match kind.num_type(ctx.map_type) {
				Some(ty) => Self::Numbers(NumList::parse(data, ty)?),
				None => Self::Raw(data.to_vec()),
			},
		})
	}

	/// Encodes this lump for a file of variant `ctx`. `num_type` is the element width numeric lumps should be written with, and
	/// `offset` is where in the file the lump will be written, which game lumps with absolute offsets need.
	pub fn to_bytes(&self, ctx: LumpContext, num_type: Option<NumType>, offset: usize) -> BspResult<Vec<u8>> {
		match self {
			Self::Entities(entities) => Ok(entities.to_bytes()),
			Self::Planes(lump) => lump.to_bytes(ctx),
			Self::Vertices(lump) => lump.to_bytes(ctx),
			Self::Vectors(lump) => lump.to_bytes(ctx),
			Self::Brushes(lump) => lump.to_bytes(ctx),
			Self::BrushSides(lump) => lump.to_bytes(ctx),
			Self::TextureData(lump) => lump.to_bytes(ctx),
			Self::Displacements(lump) => lump.to_bytes(ctx),
			Self::DisplacementVertices(lump) => lump.to_bytes(ctx),
			Self::Numbers(list) => Ok(list.to_bytes(num_type.unwrap_or(list.ty))),
			Self::GameLump(game_lump) => game_lump.to_bytes(ctx.map_type, offset),
			Self::Raw(bytes) => Ok(bytes.clone()),
		}
	}

	/// Number of elements, for logging.
	pub fn count(&self) -> usize {
		match self {
			Self::Entities(entities) => entities.len(),
			Self::Planes(lump) => lump.len(),
			Self::Vertices(lump) => lump.len(),
			Self::Vectors(lump) => lump.len(),
			Self::Brushes(lump) => lump.len(),
			Self::BrushSides(lump) => lump.len(),
			Self::TextureData(lump) => lump.len(),
			Self::Displacements(lump) => lump.len(),
			Self::DisplacementVertices(lump) => lump.len(),
			Self::Numbers(list) => list.len(),
			Self::GameLump(game_lump) => game_lump.entries().len(),
			Self::Raw(bytes) => bytes.len(),
		}
	}
}

/// A lump that records can own a contiguous run of.
pub trait LumpTarget {
	type Element;
	const KIND: LumpKind;
	fn elements(data: &LumpData) -> Option<&[Self::Element]>;
}

impl LumpTarget for BrushSide {
	type Element = BrushSide;
	const KIND: LumpKind = LumpKind::BrushSides;

	fn elements(data: &LumpData) -> Option<&[Self::Element]> {
		Self::peel(data).map(|lump| lump.items.as_slice())
	}
}

impl LumpTarget for DisplacementVertex {
	type Element = DisplacementVertex;
	const KIND: LumpKind = LumpKind::DisplacementVertices;

	fn elements(data: &LumpData) -> Option<&[Self::Element]> {
		Self::peel(data).map(|lump| lump.items.as_slice())
	}
}

/// A record that owns the elements `[first_index, first_index + count)` of lump `T`.
///
/// Resolved through [`Bsp::referenced`](crate::bsp::Bsp::referenced), never stored, so edits to the target lump are visible immediately.
pub trait LumpRange<T: LumpTarget> {
	fn first_index(&self) -> Option<i64>;
	fn count(&self) -> Option<i64>;
}
