//! The on-disk variant of a BSP file.

use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

#[cfg(feature = "bevy_reflect")]
use bevy_reflect::Reflect;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which concrete BSP variant a file uses.
///
/// Variants are a bitmask: families occupy the high bits, and sub-versions add bits on top of their family's, so family membership is a
/// containment check (see [`MapType::is_subtype_of`]). Family values like [`MapType::Source`] double as "any variant of this family".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, IntoStaticStr)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u32)]
pub enum MapType {
	#[default]
	Undefined = 0x00000000,

	Quake = 0x01000000,
	GoldSrc = 0x01010000,
	BlueShift = 0x01010001,

	Quake2 = 0x02000000,
	Daikatana = 0x02000001,
	SoF = 0x02000002,
	SiN = 0x02000004,

	Quake3 = 0x04000000,
	ET = 0x04000001,
	Raven = 0x04010000,
	CoD = 0x04020000,
	CoDDemo = 0x04020001,
	CoD2 = 0x04020002,
	CoD4 = 0x04020004,
	UberTools = 0x04040000,
	STEF2 = 0x04040100,
	STEF2Demo = 0x04040101,
	MOHAA = 0x04040200,
	MOHAADemo = 0x04040201,
	MOHAABT = 0x04040202,
	FAKK2 = 0x04040400,
	Alice = 0x04040401,

	Nightfire = 0x08000000,

	Source = 0x10000000,
	Source17 = 0x10000100,
	Source18 = 0x10000200,
	Source19 = 0x10000400,
	Source20 = 0x10000800,
	DMoMaM = 0x10000801,
	Vindictus = 0x10000802,
	Source21 = 0x10001000,
	L4D2 = 0x10001001,
	TacticalInterventionEncrypted = 0x10001002,
	Source22 = 0x10002000,
	Source23 = 0x10004000,
	Source27 = 0x10008000,

	Titanfall = 0x20000000,
}

impl MapType {
	#[inline]
	pub const fn bits(self) -> u32 {
		self as u32
	}

	/// Looks up the variant with exactly these bits.
	pub fn from_bits(bits: u32) -> Option<Self> {
		Self::iter().find(|map_type| map_type.bits() == bits)
	}

	/// Returns `true` if every bit of `family` is set in `self`. A variant is always a subtype of itself.
	#[inline]
	pub const fn is_subtype_of(self, family: MapType) -> bool {
		self.bits() & family.bits() == family.bits()
	}

	#[inline]
	pub const fn is_undefined(self) -> bool {
		matches!(self, Self::Undefined)
	}

	/// The number of lump directory slots this variant's header has. CoD4 stores its real count in the header, this returns its maximum.
	pub fn num_lumps(self) -> usize {
		use MapType::*;
		match self {
			Titanfall => 128,
			_ if self.is_subtype_of(Source) => 64,
			_ if self.is_subtype_of(Quake) => 15,
			_ if self.is_subtype_of(MOHAA) => 28,
			_ if self.is_subtype_of(STEF2) => 30,
			_ if self.is_subtype_of(FAKK2) => 20,
			SiN => 20,
			Raven | Nightfire => 18,
			Quake2 => 19,
			Daikatana => 21,
			SoF => 22,
			CoD | CoDDemo => 31,
			CoD2 => 39,
			CoD4 => 55,
			Quake3 | ET => 17,
			_ => 0,
		}
	}

	/// The byte size of one lump directory entry.
	pub fn lump_info_len(self) -> usize {
		if self.is_subtype_of(Self::Source) || self == Self::Titanfall {
			16
		} else {
			8
		}
	}
}
