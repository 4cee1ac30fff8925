//! Utilities for BSP data that don't warrant their own modules.

use std::str::FromStr;

#[cfg(feature = "bevy_reflect")]
use bevy_reflect::Reflect;
#[cfg(feature = "serde")]
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
	reader::{BspByteReader, BspByteWriter, BspValue},
	BspError, BspResult,
};

/// Fixed-sized UTF-8 string. Zero-padded.
///
/// Bytes after the first `'\0'` are kept as they are, so writing a string back out reproduces it exactly.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
pub struct FixedStr<const N: usize> {
	data: [u8; N],
}

impl<const N: usize> BspValue for FixedStr<N> {
	fn bsp_parse(reader: &mut BspByteReader) -> BspResult<Self> {
		let data = reader.read()?;
		Self::new(data).map_err(BspError::map_utf8_error(&data))
	}
	fn bsp_write(&self, writer: &mut BspByteWriter) {
		writer.write_bytes(&self.data);
	}
	#[inline]
	fn bsp_struct_size() -> usize {
		N
	}
}

impl<const N: usize> FixedStr<N> {
	pub fn new(data: [u8; N]) -> Result<Self, std::str::Utf8Error> {
		std::str::from_utf8(&data[..Self::terminator(&data)])?;
		Ok(Self { data })
	}

	fn terminator(data: &[u8; N]) -> usize {
		data.iter().position(|b| *b == 0).unwrap_or(N)
	}

	pub fn as_str(&self) -> &str {
		// SAFETY: This is checked when a FixedStr is created
		unsafe { std::str::from_utf8_unchecked(&self.data[..Self::terminator(&self.data)]) }
	}

	#[inline]
	pub fn as_bytes(&self) -> &[u8; N] {
		&self.data
	}
}

impl<const N: usize> Default for FixedStr<N> {
	fn default() -> Self {
		Self { data: [0; N] }
	}
}

impl<const N: usize> std::fmt::Debug for FixedStr<N> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}

impl<const N: usize> std::fmt::Display for FixedStr<N> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.as_str().fmt(f)
	}
}

impl<const N: usize> FromStr for FixedStr<N> {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if s.len() > N {
			return Err(());
		}
		let mut data = [0; N];
		data[..s.len()].copy_from_slice(s.as_bytes());

		Ok(Self { data })
	}
}

#[cfg(feature = "serde")]
impl<const N: usize> Serialize for FixedStr<N> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

#[cfg(feature = "serde")]
impl<'de, const N: usize> Deserialize<'de> for FixedStr<N> {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct DataVisitor<const N: usize>;
		impl<const N: usize> de::Visitor<'_> for DataVisitor<N> {
			type Value = FixedStr<N>;
			fn expecting(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
				write!(fmt, "Fixed string of max len {N}")
			}

			fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
				v.parse()
					.map_err(|_| E::custom(format_args!("string was of len {}, when max len is {N}", v.len())))
			}
		}

		deserializer.deserialize_str(DataVisitor::<N>)
	}
}
