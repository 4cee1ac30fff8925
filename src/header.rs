//! The fixed header and lump directory at the start of every BSP file.

use anybsp_macros::BspValue;

use crate::{
	prelude::*,
	reader::{BspByteReader, BspByteWriter, BspValue},
};

/// Where a lump's bytes live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LumpInfo {
	pub ident: i32,
	pub flags: i32,
	pub version: i32,
	/// Absolute byte offset, either in the BSP file itself or in [`external_file`](Self::external_file) if set.
	pub offset: u32,
	pub length: u32,
	/// Path of the external lump file this lump is stored in, if any.
	pub external_file: Option<String>,
}

impl LumpInfo {
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.length == 0
	}

	/// Byte range this lump covers in its file.
	#[inline]
	pub fn range(&self) -> std::ops::Range<usize> {
		self.offset as usize..self.offset as usize + self.length as usize
	}
}

#[derive(BspValue)]
struct OffsetLengthEntry {
	offset: u32,
	length: u32,
}

#[derive(BspValue)]
struct LengthOffsetEntry {
	length: u32,
	offset: u32,
}

#[derive(BspValue)]
struct SourceEntry {
	offset: u32,
	length: u32,
	version: i32,
	ident: i32,
}

#[derive(BspValue)]
struct VersionFirstEntry {
	version: i32,
	offset: u32,
	length: u32,
	ident: i32,
}

/// A CoD4 directory entry. Lumps are stored in directory order, each starting at the next 4-byte boundary.
#[derive(BspValue)]
struct IdLengthEntry {
	id: i32,
	length: u32,
}

/// Field order of one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryLayout {
	OffsetLength,
	LengthOffset,
	Source,
	VersionFirst,
}

impl EntryLayout {
	fn for_map_type(map_type: MapType) -> Self {
		match map_type {
			MapType::L4D2 | MapType::Source27 => Self::VersionFirst,
			MapType::Titanfall => Self::Source,
			MapType::CoD | MapType::CoD2 => Self::LengthOffset,
			_ if map_type.is_subtype_of(MapType::Source) => Self::Source,
			_ => Self::OffsetLength,
		}
	}

	fn read(self, reader: &mut BspByteReader) -> BspResult<LumpInfo> {
		Ok(match self {
			Self::OffsetLength => {
				let OffsetLengthEntry { offset, length } = reader.read()?;
				LumpInfo { offset, length, ..Default::default() }
			}
			Self::LengthOffset => {
				let LengthOffsetEntry { length, offset } = reader.read()?;
				LumpInfo { offset, length, ..Default::default() }
			}
			Self::Source => {
				let SourceEntry { offset, length, version, ident } = reader.read()?;
				LumpInfo { ident, version, offset, length, ..Default::default() }
			}
			Self::VersionFirst => {
				let VersionFirstEntry { version, offset, length, ident } = reader.read()?;
				LumpInfo { ident, version, offset, length, ..Default::default() }
			}
		})
	}

	fn write(self, info: &LumpInfo, writer: &mut BspByteWriter) {
		let (ident, version, length) = (info.ident, info.version, info.length);
		// Empty lumps get no offset, except in CoD's length-first entries.
		let offset = if length > 0 { info.offset } else { 0 };
		match self {
			Self::OffsetLength => writer.write(&OffsetLengthEntry { offset, length }),
			Self::LengthOffset => writer.write(&LengthOffsetEntry { length, offset: info.offset }),
			Self::Source => writer.write(&SourceEntry { offset, length, version, ident }),
			Self::VersionFirst => writer.write(&VersionFirstEntry { version, offset, length, ident }),
		}
	}
}

const IBSP: [u8; 4] = *b"IBSP";
const RBSP: [u8; 4] = *b"RBSP";
const VBSP: [u8; 4] = *b"VBSP";
const EALA: [u8; 4] = *b"EALA";
const MOHAA_2015: [u8; 4] = *b"2015";
const EF2: [u8; 4] = *b"EF2!";
const RBSP_TITANFALL: [u8; 4] = *b"rBSP";
const FAKK: [u8; 4] = *b"FAKK";

/// The identifying bytes a file of `map_type` starts with. Empty for family values that aren't a concrete variant.
pub fn magic(map_type: MapType) -> SmallVec<[u8; 8]> {
	use MapType::*;

	let (ident, version): (Option<[u8; 4]>, i32) = match map_type {
		Quake => (None, 29),
		GoldSrc | BlueShift => (None, 30),
		Nightfire => (None, 42),
		Quake2 => (Some(IBSP), 38),
		Daikatana => (Some(IBSP), 41),
		SoF | Quake3 => (Some(IBSP), 46),
		ET => (Some(IBSP), 47),
		CoD => (Some(IBSP), 59),
		CoDDemo => (Some(IBSP), 58),
		CoD2 => (Some(IBSP), 4),
		CoD4 => (Some(IBSP), 22),
		SiN | Raven => (Some(RBSP), 1),
		STEF2 => (Some(EF2), 20),
		STEF2Demo => (Some(FAKK), 19),
		MOHAA => (Some(MOHAA_2015), 19),
		MOHAADemo => (Some(MOHAA_2015), 18),
		MOHAABT => (Some(EALA), 21),
		FAKK2 => (Some(FAKK), 12),
		Alice => (Some(FAKK), 42),
		Source17 => (Some(VBSP), 17),
		Source18 => (Some(VBSP), 18),
		Source19 => (Some(VBSP), 19),
		Source20 | Vindictus => (Some(VBSP), 20),
		DMoMaM => (Some(VBSP), 0x40014),
		Source21 | L4D2 | TacticalInterventionEncrypted => (Some(VBSP), 21),
		Source22 => (Some(VBSP), 22),
		Source23 => (Some(VBSP), 23),
		Source27 => (Some(VBSP), 27),
		Titanfall => (Some(RBSP_TITANFALL), 29),
		_ => return SmallVec::new(),
	};

	let mut bytes = SmallVec::new();
	if let Some(ident) = ident {
		bytes.extend_from_slice(&ident);
	}
	bytes.extend_from_slice(&version.to_le_bytes());
	bytes
}

/// Where the directory starts, after the magic and any preamble.
fn directory_offset(map_type: MapType) -> usize {
	let magic_len = magic(map_type).len();
	if map_type == MapType::Titanfall {
		// Map revision and lump count.
		magic_len + 8
	} else if map_type.is_subtype_of(MapType::UberTools) || map_type == MapType::CoD4 {
		// Revision, or lump count for CoD4.
		magic_len + 4
	} else {
		magic_len
	}
}

/// Bytes after the directory that are part of the header, kept as-is when regenerating.
fn trailer_len(map_type: MapType) -> usize {
	if map_type.is_subtype_of(MapType::Source) {
		// Map revision.
		4
	} else {
		0
	}
}

/// The raw header of a BSP file: magic number, preamble and lump directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BspHeader {
	map_type: MapType,
	bytes: Vec<u8>,
}

impl BspHeader {
	/// Takes the header bytes of `file`, a whole BSP file of variant `map_type`. Errors if the file is too short.
	pub fn parse(map_type: MapType, file: &[u8]) -> BspResult<Self> {
		let len = Self::len_for(map_type, file)?;
		let bytes = BspByteReader::new(file).read_bytes(len).job("Reading header")?;
		Ok(Self {
			map_type,
			bytes: bytes.to_vec(),
		})
	}

	/// Byte length of the header of `file`. Only CoD4 needs to look at the file, as its lump count varies.
	pub fn len_for(map_type: MapType, file: &[u8]) -> BspResult<usize> {
		if map_type == MapType::CoD4 {
			let num_lumps: u32 = BspByteReader::new(file).with_pos(magic(map_type).len()).read().job("Reading CoD4 lump count")?;
			return Ok(directory_offset(map_type) + IdLengthEntry::bsp_struct_size() * num_lumps as usize);
		}
		Ok(Self::fixed_len(map_type))
	}

	fn fixed_len(map_type: MapType) -> usize {
		directory_offset(map_type) + map_type.lump_info_len() * map_type.num_lumps() + trailer_len(map_type)
	}

	#[inline]
	pub fn map_type(&self) -> MapType {
		self.map_type
	}

	#[inline]
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	/// The map revision counter of UberTools variants, 0 for everything else.
	pub fn revision(&self) -> i32 {
		if !self.map_type.is_subtype_of(MapType::UberTools) {
			return 0;
		}
		BspByteReader::new(&self.bytes).with_pos(8).read().unwrap_or(0)
	}

	/// Reads the directory entry of slot `index` from the header alone. External lump files are handled by [`Bsp`](crate::bsp::Bsp).
	///
	/// Entries past the end of the header are empty.
	pub fn lump_info(&self, index: usize) -> BspResult<LumpInfo> {
		let num_lumps = self.map_type.num_lumps();
		if index >= num_lumps {
			return Err(BspError::LumpIndexOutOfRange {
				index,
				num_lumps,
				map_type: self.map_type,
			});
		}

		if self.map_type == MapType::CoD4 {
			return Ok(self.cod4_lump_info(index));
		}

		let layout = EntryLayout::for_map_type(self.map_type);
		let pos = directory_offset(self.map_type) + self.map_type.lump_info_len() * index;
		let info = match layout.read(&mut BspByteReader::new(&self.bytes).with_pos(pos)) {
			Ok(info) => info,
			Err(_) => LumpInfo::default(),
		};
		log::trace!("{} lump {index}: {info:?}", self.map_type);
		Ok(info)
	}

	fn cod4_lump_info(&self, index: usize) -> LumpInfo {
		let mut reader = BspByteReader::new(&self.bytes).with_pos(magic(MapType::CoD4).len());
		let Ok(num_lumps) = reader.read::<u32>() else { return LumpInfo::default() };

		let mut offset = directory_offset(MapType::CoD4) + IdLengthEntry::bsp_struct_size() * num_lumps as usize;
		for _ in 0..num_lumps {
			let Ok(IdLengthEntry { id, length }) = reader.read() else { break };
			if id as usize == index {
				return LumpInfo {
					ident: id,
					offset: offset as u32,
					length,
					..Default::default()
				};
			}
			offset = (offset + length as usize).next_multiple_of(4);
		}
		LumpInfo::default()
	}

	/// Builds a new header where lump `i` has length, version and ident of `lumps[i]`, and lumps are laid out back to back after the
	/// header in slot order. CoD4 lists only lumps with data, each starting on a 4-byte boundary.
	///
	/// Doesn't modify `self`, so regenerating from the same header twice gives the same result.
	pub fn regenerate(&self, lumps: &[LumpInfo]) -> Self {
		let map_type = self.map_type;
		if map_type.is_undefined() {
			return Self::default();
		}

		let mut writer = BspByteWriter::new();
		writer.write_bytes(&magic(map_type));

		if map_type == MapType::CoD4 {
			let present: Vec<(usize, &LumpInfo)> = lumps.iter().enumerate().filter(|(_, info)| info.length > 0).collect();
			writer.write(&(present.len() as u32));
			for (id, info) in present {
				writer.write(&IdLengthEntry {
					id: id as i32,
					length: info.length,
				});
			}
			return Self {
				map_type,
				bytes: writer.into_bytes(),
			};
		}

		if map_type == MapType::Titanfall {
			writer.write_bytes(self.bytes.get(8..16).unwrap_or(&[0; 8]));
		} else if map_type.is_subtype_of(MapType::UberTools) {
			writer.write(&self.revision().wrapping_add(1));
		}

		let layout = EntryLayout::for_map_type(map_type);
		let header_len = Self::fixed_len(map_type);
		let mut offset = header_len;
		for i in 0..map_type.num_lumps() {
			let mut info = lumps.get(i).cloned().unwrap_or_default();
			info.offset = offset as u32;
			layout.write(&info, &mut writer);
			// Keep the fixed entry size even for layouts with fewer fields.
			writer.pad_to(directory_offset(map_type) + map_type.lump_info_len() * (i + 1));
			offset += info.length as usize;
		}

		let trailer = trailer_len(map_type);
		if trailer > 0 {
			let start = self.bytes.len().saturating_sub(trailer);
			writer.write_bytes(self.bytes.get(start..).filter(|bytes| bytes.len() == trailer).unwrap_or(&[0; 4][..trailer]));
		}
		writer.pad_to(header_len);

		Self {
			map_type,
			bytes: writer.into_bytes(),
		}
	}

	/// An all-zero header for a new file of `map_type`, with the magic number already set.
	pub fn empty(map_type: MapType) -> Self {
		let mut writer = BspByteWriter::new();
		writer.write_bytes(&magic(map_type));
		if map_type == MapType::CoD4 {
			writer.write(&0_u32);
		} else {
			writer.pad_to(Self::fixed_len(map_type));
		}
		Self {
			map_type,
			bytes: writer.into_bytes(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn info(length: u32) -> LumpInfo {
		LumpInfo { length, ..Default::default() }
	}

	#[test]
	fn magic_numbers() {
		assert_eq!(magic(MapType::Source20).as_slice(), b"VBSP\x14\0\0\0");
		assert_eq!(magic(MapType::DMoMaM).as_slice(), b"VBSP\x14\0\x04\0");
		assert_eq!(magic(MapType::Quake).as_slice(), &29_i32.to_le_bytes());
		assert_eq!(magic(MapType::MOHAABT).as_slice(), b"EALA\x15\0\0\0");
		assert_eq!(magic(MapType::SiN).as_slice(), b"RBSP\x01\0\0\0");
		assert!(magic(MapType::Source).is_empty());
	}

	#[test]
	fn header_lengths() {
		assert_eq!(BspHeader::empty(MapType::Source20).len(), 1036);
		assert_eq!(BspHeader::empty(MapType::Quake).len(), 124);
		assert_eq!(BspHeader::empty(MapType::Quake3).len(), 144);
		assert_eq!(BspHeader::empty(MapType::SoF).len(), 184);
		assert_eq!(BspHeader::empty(MapType::MOHAA).len(), 12 + 28 * 8);
		assert_eq!(BspHeader::empty(MapType::Titanfall).len(), 16 + 128 * 16);
		assert_eq!(BspHeader::empty(MapType::CoD4).len(), 12);
	}

	#[test]
	fn regenerate_sequential_offsets() {
		let header = BspHeader::empty(MapType::Quake2).regenerate(&[info(10), info(0), info(4)]);
		assert_eq!(header.len(), 8 + 19 * 8);
		assert_eq!(header.lump_info(0).unwrap().range(), 160..170);
		assert_eq!(header.lump_info(1).unwrap(), LumpInfo::default());
		assert_eq!(header.lump_info(2).unwrap().range(), 170..174);
		assert!(header.lump_info(3).unwrap().is_empty());
	}

	#[test]
	fn source_entry_orders() {
		let lumps = [LumpInfo {
			version: 3,
			ident: 7,
			length: 20,
			..Default::default()
		}];
		for map_type in [MapType::Source20, MapType::L4D2] {
			let header = BspHeader::empty(map_type).regenerate(&lumps);
			let info = header.lump_info(0).unwrap();
			assert_eq!((info.offset, info.length, info.version, info.ident), (1036, 20, 3, 7), "{map_type}");
		}
		let l4d2 = BspHeader::empty(MapType::L4D2).regenerate(&lumps);
		assert_eq!(&l4d2.as_bytes()[8..12], &3_i32.to_le_bytes());
	}

	#[test]
	fn source_map_revision_is_kept() {
		let mut file = BspHeader::empty(MapType::Source19).as_bytes().to_vec();
		file[1032..1036].copy_from_slice(&1234_i32.to_le_bytes());
		let header = BspHeader::parse(MapType::Source19, &file).unwrap().regenerate(&[]);
		assert_eq!(&header.as_bytes()[1032..], &1234_i32.to_le_bytes());
	}

	#[test]
	fn uber_tools_revision() {
		let mut file = BspHeader::empty(MapType::FAKK2).as_bytes().to_vec();
		file[8..12].copy_from_slice(&5_i32.to_le_bytes());
		let header = BspHeader::parse(MapType::FAKK2, &file).unwrap();
		assert_eq!(header.revision(), 5);

		let regenerated = header.regenerate(&[]);
		assert_eq!(regenerated.revision(), 6);
		assert_eq!(header.regenerate(&[]), regenerated);
	}

	#[test]
	fn cod4_directory() {
		let lumps = [info(0), info(6), info(0), info(0), info(8)];
		let header = BspHeader::empty(MapType::CoD4).regenerate(&lumps);
		assert_eq!(header.len(), 12 + 2 * 8);
		assert_eq!(&header.as_bytes()[8..12], &2_u32.to_le_bytes());

		let first = header.lump_info(1).unwrap();
		assert_eq!((first.offset, first.length), (28, 6));
		let second = header.lump_info(4).unwrap();
		assert_eq!((second.offset, second.length), (36, 8));
		assert!(header.lump_info(2).unwrap().is_empty());
	}

	#[test]
	fn index_out_of_range() {
		let header = BspHeader::empty(MapType::Quake);
		assert!(matches!(header.lump_info(15), Err(BspError::LumpIndexOutOfRange { index: 15, num_lumps: 15, .. })));
	}
}
