//! Identifying which [`MapType`] a file is, from its first bytes.

use crate::{prelude::*, raw::xor_key_stream, reader::BspByteReader};

const IBSP: i32 = i32::from_le_bytes(*b"IBSP");
const RBSP: i32 = i32::from_le_bytes(*b"RBSP");
const VBSP: i32 = i32::from_le_bytes(*b"VBSP");
const EALA: i32 = i32::from_le_bytes(*b"EALA");
const MOHAA: i32 = i32::from_le_bytes(*b"2015");
const EF2: i32 = i32::from_le_bytes(*b"EF2!");
const RBSP_TITANFALL: i32 = i32::from_le_bytes(*b"rBSP");
const FAKK: i32 = i32::from_le_bytes(*b"FAKK");

/// Offset of the key of [`MapType::TacticalInterventionEncrypted`] files.
pub const KEY_OFFSET: usize = 384;
pub const KEY_LEN: usize = 32;

/// Searched for in lump 0 to tell GoldSrc files, whose first lump is entities, from Blue Shift ones.
const ENTITY_PATTERN: &[u8] = b"\"classname\"";

/// Identifies the variant of a BSP file. Returns [`MapType::Undefined`] if it isn't recognized, or is too short to tell.
pub fn sniff(bytes: &[u8]) -> MapType {
	match identify(bytes) {
		Ok(map_type) => {
			log::info!("Identified BSP variant {map_type}");
			map_type
		}
		Err(err) => {
			log::debug!("Failed to identify BSP variant: {err}");
			MapType::Undefined
		}
	}
}

/// Extracts the key [`MapType::TacticalInterventionEncrypted`] files are encrypted with.
pub fn encryption_key(bytes: &[u8]) -> BspResult<[u8; KEY_LEN]> {
	BspByteReader::new(bytes).with_pos(KEY_OFFSET).read()
}

fn identify(bytes: &[u8]) -> BspResult<MapType> {
	let mut reader = BspByteReader::new(bytes);
	let magic: i32 = reader.read()?;

	Ok(match magic {
		IBSP => match reader.read::<i32>()? {
			4 => MapType::CoD2,
			22 => MapType::CoD4,
			38 => MapType::Quake2,
			41 => MapType::Daikatana,
			46 => probe_first_lump_offset(&mut reader, 184, 144, MapType::SoF, MapType::Quake3)?,
			47 => MapType::ET,
			58 => MapType::CoDDemo,
			59 => MapType::CoD,
			_ => MapType::Undefined,
		},
		MOHAA => match reader.read::<i32>()? {
			18 => MapType::MOHAADemo,
			_ => MapType::MOHAA,
		},
		EALA => MapType::MOHAABT,
		VBSP => match reader.read::<u16>()? {
			17 => MapType::Source17,
			18 => MapType::Source18,
			19 => MapType::Source19,
			20 => {
				if reader.read::<u16>()? == 4 {
					MapType::DMoMaM
				} else if is_vindictus(bytes)? {
					MapType::Vindictus
				} else {
					MapType::Source20
				}
			}
			21 => {
				// L4D2 directories start with the lump version, regular ones with an offset past the header.
				if reader.with_pos(8).read::<i32>()? < 1032 {
					MapType::L4D2
				} else {
					MapType::Source21
				}
			}
			22 => MapType::Source22,
			23 => MapType::Source23,
			27 => MapType::Source27,
			_ => MapType::Undefined,
		},
		RBSP => probe_first_lump_offset(&mut reader, 168, 152, MapType::SiN, MapType::Raven)?,
		EF2 => MapType::STEF2,
		RBSP_TITANFALL => MapType::Titanfall,
		FAKK => match reader.read::<i32>()? {
			12 => MapType::FAKK2,
			19 => MapType::STEF2Demo,
			42 => MapType::Alice,
			_ => MapType::Undefined,
		},
		29 => MapType::Quake,
		30 => {
			if lump_0_has_entities(bytes)? {
				MapType::GoldSrc
			} else {
				MapType::BlueShift
			}
		}
		42 => MapType::Nightfire,
		_ => {
			let key = encryption_key(bytes)?;
			let mut magic = magic.to_le_bytes();
			xor_key_stream(&mut magic, &key, 0);
			if i32::from_le_bytes(magic) == VBSP {
				MapType::TacticalInterventionEncrypted
			} else {
				log::debug!("Unknown magic number \"{}\"", display_magic_number(&magic));
				MapType::Undefined
			}
		}
	})
}

/// Siblings sharing a magic number have different lump counts, so their first lump starts right after a differently sized header.
/// Walks the first directory slots looking for either header size.
fn probe_first_lump_offset(
	reader: &mut BspByteReader,
	sibling_header_len: i32,
	default_header_len: i32,
	sibling: MapType,
	default: MapType,
) -> BspResult<MapType> {
	for i in 0..17 {
		reader.seek((i + 1) * 8);
		let value: i32 = reader.read()?;
		if value == sibling_header_len {
			return Ok(sibling);
		} else if value == default_header_len {
			break;
		}
	}
	Ok(default)
}

/// Vindictus game lump directory entries are 20 bytes, so the field where a 16-byte entry keeps its offset holds a small version.
fn is_vindictus(bytes: &[u8]) -> BspResult<bool> {
	let reader = BspByteReader::new(bytes);
	let game_lump_offset: i32 = reader.with_pos(568).read()?;
	// Empty game lumps have no offset.
	let Ok(game_lump_offset @ 1..) = usize::try_from(game_lump_offset) else { return Ok(false) };

	let count: i32 = reader.with_pos(game_lump_offset).read()?;
	if count <= 0 {
		return Ok(false);
	}
	let test_offset: i32 = reader.with_pos(game_lump_offset + 12).read()?;
	if test_offset < 24 {
		log::warn!("Guessing Vindictus from game lump entry field {test_offset}");
		return Ok(true);
	}
	Ok(false)
}

fn lump_0_has_entities(bytes: &[u8]) -> BspResult<bool> {
	let mut reader = BspByteReader::new(bytes).with_pos(4);
	let offset: i32 = reader.read()?;
	let length: i32 = reader.read()?;

	let start = usize::try_from(offset).unwrap_or(0).min(bytes.len());
	// Truncated lumps are searched as far as the file goes.
	let search_len = usize::try_from(length)
		.unwrap_or(0)
		.min(bytes.len() - start)
		.saturating_sub(ENTITY_PATTERN.len());
	let data = reader.with_pos(start).read_bytes(search_len)?;

	let mut matched = 0;
	for byte in data {
		if *byte == ENTITY_PATTERN[matched] {
			matched += 1;
			if matched == ENTITY_PATTERN.len() {
				return Ok(true);
			}
		} else {
			matched = 0;
		}
	}
	Ok(false)
}
