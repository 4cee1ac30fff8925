//! Module containing the core of reading and writing the fixed binary structures of a BSP file.

use std::mem;

use crate::{prelude::*, BspError};

/// Like a [`Cursor`](std::io::Cursor), but i don't have to constantly juggle buffers.
#[derive(Clone)]
pub struct BspByteReader<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> BspByteReader<'a> {
	#[inline]
	pub fn new(bytes: &'a [u8]) -> Self {
		Self { bytes, pos: 0 }
	}

	fn rest(&self) -> &[u8] {
		self.bytes.get(self.pos..).unwrap_or_default()
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.rest().len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.rest().is_empty()
	}

	#[inline]
	pub fn read<T: BspValue>(&mut self) -> BspResult<T> {
		T::bsp_parse(self)
	}

	/// Consume the rest of the reader, returning all remaining bytes.
	#[inline]
	pub fn read_rest(&mut self) -> &'a [u8] {
		let pos = self.pos.min(self.bytes.len());
		self.pos = self.bytes.len();

		&self.bytes[pos..]
	}

	#[inline]
	pub fn read_bytes(&mut self, count: usize) -> BspResult<&'a [u8]> {
		let (from, to) = (self.pos, self.pos + count);
		if to > self.bytes.len() {
			return Err(BspError::BufferOutOfBounds {
				from,
				to,
				size: self.bytes.len(),
			});
		}
		let bytes = &self.bytes[from..to];
		self.pos += count;
		Ok(bytes)
	}

	#[inline]
	pub fn with_pos(&self, pos: usize) -> Self {
		Self { bytes: self.bytes, pos }
	}

	/// Moves the cursor to an absolute position.
	#[inline]
	pub fn seek(&mut self, pos: usize) {
		self.pos = pos;
	}

	#[inline]
	pub fn pos(&self) -> usize {
		self.pos
	}

	/// Returns `true` if `pos` is less than `bytes.len()`.
	#[inline]
	pub fn in_bounds(&self) -> bool {
		self.pos < self.bytes.len()
	}
}

/// Growable little-endian output buffer, the writing counterpart of [`BspByteReader`].
#[derive(Debug, Clone, Default)]
pub struct BspByteWriter {
	bytes: Vec<u8>,
}

impl BspByteWriter {
	#[inline]
	pub fn new() -> Self {
		Self::default()
	}

	#[inline]
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			bytes: Vec::with_capacity(capacity),
		}
	}

	#[inline]
	pub fn write<T: BspValue>(&mut self, value: &T) {
		value.bsp_write(self);
	}

	#[inline]
	pub fn write_bytes(&mut self, bytes: &[u8]) {
		self.bytes.extend_from_slice(bytes);
	}

	/// Zero-fills the buffer up to `len` bytes. Does nothing if it is already that long.
	pub fn pad_to(&mut self, len: usize) {
		if self.bytes.len() < len {
			self.bytes.resize(len, 0);
		}
	}

	/// Zero-fills the buffer until its length is a multiple of `alignment`.
	pub fn align(&mut self, alignment: usize) {
		self.pad_to(self.bytes.len().next_multiple_of(alignment));
	}

	/// Overwrites previously written bytes starting at `pos`, growing the buffer if needed.
	pub fn write_at(&mut self, pos: usize, bytes: &[u8]) {
		self.pad_to(pos + bytes.len());
		self.bytes[pos..pos + bytes.len()].copy_from_slice(bytes);
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	#[inline]
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	#[inline]
	pub fn into_bytes(self) -> Vec<u8> {
		self.bytes
	}
}

/// Defines how a fixed-size type is read from and written to a BSP file.
pub trait BspValue: Sized {
	fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self>;
	fn bsp_write(&self, writer: &mut BspByteWriter);
	fn bsp_struct_size() -> usize;
}

macro_rules! impl_bsp_value_primitive {
	($ty:ty) => {
		impl BspValue for $ty {
			#[inline]
			fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self> {
				let mut bytes = [0; size_of::<$ty>()];
				bytes.copy_from_slice(reader.read_bytes(size_of::<$ty>())?);
				Ok(<$ty>::from_le_bytes(bytes))
			}
			#[inline]
			fn bsp_write(&self, writer: &mut BspByteWriter) {
				writer.write_bytes(&self.to_le_bytes());
			}
			#[inline]
			fn bsp_struct_size() -> usize {
				size_of::<$ty>()
			}
		}
	};
}

macro_rules! impl_bsp_value_vector {
	($ty:ty : [$element:ty; $count:expr]) => {
		impl BspValue for $ty {
			fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self> {
				Ok(<$ty>::from_array(reader.read::<[$element; $count]>()?))
			}
			fn bsp_write(&self, writer: &mut BspByteWriter) {
				writer.write(&self.to_array());
			}
			fn bsp_struct_size() -> usize {
				size_of::<$element>() * $count
			}
		}
	};
}

impl_bsp_value_primitive!(u8);
impl_bsp_value_primitive!(i8);

impl_bsp_value_primitive!(u16);
impl_bsp_value_primitive!(u32);
impl_bsp_value_primitive!(u64);

impl_bsp_value_primitive!(i16);
impl_bsp_value_primitive!(i32);
impl_bsp_value_primitive!(i64);

impl_bsp_value_primitive!(f32);

impl_bsp_value_vector!(Vec2: [f32; 2]);
impl_bsp_value_vector!(Vec3: [f32; 3]);
impl_bsp_value_vector!(Vec4: [f32; 4]);

impl<T: BspValue, const N: usize> BspValue for [T; N] {
	#[inline]
	fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self> {
		// Look ma, no heap allocations!
		let mut out = [(); N].map(|_| mem::MaybeUninit::<T>::uninit());
		for i in 0..N {
			match reader.read() {
				Ok(value) => {
					out[i].write(value);
				}
				Err(err) => {
					// Drop whatever was already read before bailing.
					for initialized in &mut out[..i] {
						// SAFETY: Every slot before `i` was written above.
						unsafe { initialized.assume_init_drop() };
					}
					return Err(err);
				}
			}
		}
		// SAFETY: Every slot was written in the loop above.
		Ok(out.map(|v| unsafe { v.assume_init() }))
	}
	#[inline]
	fn bsp_write(&self, writer: &mut BspByteWriter) {
		for value in self {
			value.bsp_write(writer);
		}
	}
	#[inline]
	fn bsp_struct_size() -> usize {
		T::bsp_struct_size() * N
	}
}
