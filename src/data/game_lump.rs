//! The game lump: a directory of versioned, game-specific sub-lumps, found in Source and Titanfall maps.

use std::cell::OnceCell;

use crate::{
	data::static_props::StaticProps,
	lump::LumpContext,
	prelude::*,
	reader::{BspByteReader, BspByteWriter},
};

/// Four-character code identifying a game lump entry. Stored as a little-endian integer, so the characters read backwards on disk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GameLumpId(pub i32);

impl GameLumpId {
	pub const STATIC_PROPS: Self = Self(i32::from_le_bytes(*b"prps"));
	pub const DETAIL_PROPS: Self = Self(i32::from_le_bytes(*b"prpd"));
	pub const DETAIL_PROP_LIGHTING: Self = Self(i32::from_le_bytes(*b"tlpd"));
	pub const DETAIL_PROP_LIGHTING_HDR: Self = Self(i32::from_le_bytes(*b"hlpd"));
}

impl std::fmt::Display for GameLumpId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&display_magic_number(&self.0.to_be_bytes()))
	}
}

impl std::fmt::Debug for GameLumpId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "GameLumpId({self})")
	}
}

/// One sub-lump.
#[derive(Debug, Clone, PartialEq)]
pub struct GameLumpEntry {
	pub id: GameLumpId,
	/// Stored as 16 bits outside Vindictus.
	pub flags: i32,
	/// Stored as 16 bits outside Vindictus.
	pub version: i32,
	pub data: Vec<u8>,
}

impl GameLumpEntry {
	pub fn new(id: GameLumpId, version: i32, data: Vec<u8>) -> Self {
		Self { id, flags: 0, version, data }
	}
}

/// Byte length of one directory entry, `None` if `map_type` has no game lump.
fn entry_len(map_type: MapType) -> Option<usize> {
	match map_type {
		MapType::DMoMaM | MapType::Vindictus => Some(20),
		_ if map_type.is_subtype_of(MapType::Source) || map_type == MapType::Titanfall => Some(16),
		_ => None,
	}
}

/// Where the directory starts. DMoMaM has 4 unknown bytes after the entry count.
fn directory_offset(map_type: MapType) -> usize {
	if map_type == MapType::DMoMaM {
		8
	} else {
		4
	}
}

/// The decoded game lump of a map.
///
/// Entry data is kept as raw bytes. The static prop entry is decoded on first request and re-encoded from its decoded form on write.
#[derive(Debug, Clone, PartialEq)]
pub struct GameLump {
	/// The variant the lump was decoded from.
	pub map_type: MapType,
	entries: Vec<GameLumpEntry>,
	/// Whether entry offsets count from the start of the game lump, rather than the start of the file. Written back the same way.
	pub relative_offsets: bool,
	static_props: OnceCell<StaticProps>,
}

impl GameLump {
	pub fn new(map_type: MapType) -> Self {
		Self {
			map_type,
			entries: Vec::new(),
			relative_offsets: false,
			static_props: OnceCell::new(),
		}
	}

	/// Decodes the game lump of a `map_type` file. `info` is the lump's directory entry, whose offset absolute entry offsets are
	/// relative to.
	pub fn parse(data: &[u8], info: &LumpInfo, map_type: MapType) -> BspResult<Self> {
		let entry_len = entry_len(map_type).ok_or(BspError::UnsupportedMapType {
			what: "Game lump",
			map_type,
			version: info.version,
		})?;
		let mut game_lump = Self::new(map_type);
		if data.is_empty() {
			return Ok(game_lump);
		}

		let mut reader = BspByteReader::new(data);
		let count: i32 = reader.read().job("Reading game lump count")?;
		let count = count.max(0) as usize;
		reader.seek(directory_offset(map_type));

		let mut directory = Vec::with_capacity(count.min(data.len() / entry_len));
		for i in 0..count {
			let start = reader.pos();
			let id = GameLumpId(reader.read().job(|| format!("Reading game lump entry {i}"))?);
			let (flags, version) = if map_type == MapType::Vindictus {
				(reader.read::<i32>()?, reader.read::<i32>()?)
			} else {
				(reader.read::<u16>()? as i32, reader.read::<u16>()? as i32)
			};
			let offset: i32 = reader.read()?;
			let length: i32 = reader.read()?;
			reader.seek(start + entry_len);
			directory.push((id, flags, version, offset as i64, length.max(0) as usize));
		}

		let directory_end = (directory_offset(map_type) + count * entry_len) as i64;
		let lowest = directory.iter().filter(|entry| entry.4 > 0).map(|entry| entry.3).min();
		game_lump.relative_offsets = lowest.is_some_and(|lowest| lowest < info.offset as i64 + directory_end);
		if game_lump.relative_offsets {
			log::warn!("Game lump entry offsets are relative to the game lump");
		}

		for (id, flags, version, offset, length) in directory {
			let start = if game_lump.relative_offsets { offset } else { offset - info.offset as i64 };
			let data = if length == 0 {
				Vec::new()
			} else {
				let from = usize::try_from(start).map_err(|_| BspError::BufferOutOfBounds {
					from: 0,
					to: length,
					size: data.len(),
				})?;
				BspByteReader::new(data)
					.with_pos(from)
					.read_bytes(length)
					.job(|| format!("Reading game lump entry {id}"))?
					.to_vec()
			};
			log::debug!("Game lump entry {id} version {version}, {} bytes", data.len());
			game_lump.entries.push(GameLumpEntry { id, flags, version, data });
		}

		Ok(game_lump)
	}

	/// Encodes the game lump for a file of `map_type`, where it will start at byte `offset`.
	///
	/// A game lump without entries is written as a single zero count.
	pub fn to_bytes(&self, map_type: MapType, offset: usize) -> BspResult<Vec<u8>> {
		if self.entries.is_empty() {
			return Ok(vec![0; 4]);
		}
		let entry_len = entry_len(map_type).ok_or(BspError::UnsupportedMapType {
			what: "Game lump",
			map_type,
			version: 0,
		})?;

		let mut datas = Vec::with_capacity(self.entries.len());
		for entry in &self.entries {
			match self.static_props.get() {
				Some(props) if entry.id == GameLumpId::STATIC_PROPS => {
					datas.push(props.to_bytes(LumpContext::new(map_type, entry.version)).job("Writing static props")?);
				}
				_ => datas.push(entry.data.clone()),
			}
		}

		let directory_end = directory_offset(map_type) + self.entries.len() * entry_len;
		let base = if self.relative_offsets { 0 } else { offset };
		let mut writer = BspByteWriter::with_capacity(directory_end + datas.iter().map(Vec::len).sum::<usize>());
		writer.write(&(self.entries.len() as i32));
		writer.pad_to(directory_offset(map_type));

		let mut data_offset = base + directory_end;
		for (entry, data) in self.entries.iter().zip(&datas) {
			let start = writer.len();
			writer.write(&entry.id.0);
			if map_type == MapType::Vindictus {
				writer.write(&entry.flags);
				writer.write(&entry.version);
			} else {
				writer.write(&(entry.flags as u16));
				writer.write(&(entry.version as u16));
			}
			writer.write(&(data_offset as i32));
			writer.write(&(data.len() as i32));
			writer.pad_to(start + entry_len);
			data_offset += data.len();
		}

		for data in &datas {
			writer.write_bytes(data);
		}
		Ok(writer.into_bytes())
	}

	#[inline]
	pub fn entries(&self) -> &[GameLumpEntry] {
		&self.entries
	}

	/// Changes to the static prop entry's bytes are ignored once [`static_props`](Self::static_props) has decoded it.
	#[inline]
	pub fn entries_mut(&mut self) -> &mut Vec<GameLumpEntry> {
		&mut self.entries
	}

	pub fn entry(&self, id: GameLumpId) -> Option<&GameLumpEntry> {
		self.entries.iter().find(|entry| entry.id == id)
	}

	/// The decoded static prop entry, `None` if there is none. Decoded on the first call.
	pub fn static_props(&self) -> BspResult<Option<&StaticProps>> {
		if let Some(props) = self.static_props.get() {
			return Ok(Some(props));
		}
		let Some(entry) = self.entry(GameLumpId::STATIC_PROPS) else { return Ok(None) };

		let props = StaticProps::parse(&entry.data, LumpContext::new(self.map_type, entry.version)).job("Parsing static props")?;
		log::debug!("Loaded {} static props", props.props.len());
		Ok(Some(self.static_props.get_or_init(|| props)))
	}

	pub fn static_props_mut(&mut self) -> BspResult<Option<&mut StaticProps>> {
		if self.static_props()?.is_none() {
			return Ok(None);
		}
		Ok(self.static_props.get_mut())
	}

	/// Replaces the static prop entry, adding one if there isn't any. Its version becomes that of `props`.
	pub fn set_static_props(&mut self, props: StaticProps) {
		let version = props.ctx.version;
		match self.entries.iter_mut().find(|entry| entry.id == GameLumpId::STATIC_PROPS) {
			Some(entry) => entry.version = version,
			None => self.entries.push(GameLumpEntry::new(GameLumpId::STATIC_PROPS, version, Vec::new())),
		}
		self.static_props = OnceCell::from(props);
	}
}
