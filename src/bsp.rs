//! The BSP document: identification, the lazy lump cache and typed access to decoded lumps.

use std::cell::OnceCell;

use crate::{
	data::game_lump::GameLump,
	header::{magic, BspHeader},
	lump::{LumpRange, LumpTarget, StoredLump},
	prelude::*,
	raw::RawBsp,
	sniff::sniff,
	writer::BspWriter,
};

/// Options for opening a BSP file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BspSettings {
	/// Read the file as this variant instead of identifying it.
	pub map_type: Option<MapType>,
	/// Whether `<map>_l_<n>.lmp` files next to the map override lumps of Source and Titanfall maps.
	pub lump_files: bool,
}

impl Default for BspSettings {
	fn default() -> Self {
		Self {
			map_type: None,
			lump_files: true,
		}
	}
}

/// A BSP file being read or edited.
///
/// Lumps are decoded on first access and cached until the variant changes. Decoded lumps can be edited in place, and
/// [`write`](Self::write) produces a consistent file from them and the raw bytes of every lump that was never decoded.
#[derive(Debug)]
pub struct Bsp {
	raw: RawBsp,
	map_type: MapType,
	header: BspHeader,
	/// Directory entry of each slot, resolved on first use.
	infos: Vec<OnceCell<LumpInfo>>,
	/// Decoded lump of each slot.
	lumps: Vec<OnceCell<LumpData>>,
}

macro_rules! record_lumps {
	($($(#[$meta:meta])* $get:ident, $get_mut:ident: $ty:ty = $kind:ident;)*) => {
		$(
			$(#[$meta])*
			#[inline]
			pub fn $get(&self) -> BspResult<Option<&Lump<$ty>>> {
				self.records(LumpKind::$kind)
			}

			#[inline]
			pub fn $get_mut(&mut self) -> BspResult<Option<&mut Lump<$ty>>> {
				self.records_mut(LumpKind::$kind)
			}
		)*
	};
}

fn slots<T>(map_type: MapType) -> Vec<OnceCell<T>> {
	(0..map_type.num_lumps()).map(|_| OnceCell::new()).collect()
}

impl Bsp {
	/// Opens `path` through `source`. External lump files are looked up through `source` as well.
	pub fn open(source: Arc<dyn FileSource>, path: &str, settings: BspSettings) -> BspResult<Self> {
		let raw = RawBsp::open(source, path, settings.lump_files).job(|| format!("Opening {path}"))?;
		Self::from_raw(raw, settings.map_type)
	}

	/// Reads a BSP file from memory. There are no external lump files.
	pub fn parse(bytes: impl Into<Arc<[u8]>>, settings: BspSettings) -> BspResult<Self> {
		let raw = RawBsp::new(Arc::new(MemoryFileSource::new()), None, bytes.into(), false);
		Self::from_raw(raw, settings.map_type)
	}

	/// An empty file of `map_type`, without any lumps.
	pub fn new(map_type: MapType) -> BspResult<Self> {
		if map_type.is_undefined() || magic(map_type).is_empty() {
			return Err(BspError::UnsupportedMapType {
				what: "Creating a BSP file",
				map_type,
				version: 0,
			});
		}
		let header = BspHeader::empty(map_type);
		let raw = RawBsp::new(Arc::new(MemoryFileSource::new()), None, Arc::from(header.as_bytes()), false);
		Self::from_raw(raw, Some(map_type))
	}

	fn from_raw(mut raw: RawBsp, map_type: Option<MapType>) -> BspResult<Self> {
		let map_type = map_type.unwrap_or_else(|| sniff(raw.bytes()));
		if map_type.is_undefined() {
			return Err(BspError::UnidentifiedFormat {
				magic: raw.bytes().iter().copied().take(4).collect(),
			});
		}
		raw.set_map_type(map_type)?;
		let header = Self::read_header(&raw, map_type)?;
		log::debug!("Opened {map_type} BSP of {} bytes, header of {} bytes", raw.bytes().len(), header.len());

		Ok(Self {
			raw,
			map_type,
			header,
			infos: slots(map_type),
			lumps: slots(map_type),
		})
	}

	fn read_header(raw: &RawBsp, map_type: MapType) -> BspResult<BspHeader> {
		let len = BspHeader::len_for(map_type, raw.bytes())?;
		BspHeader::parse(map_type, &raw.header_bytes(len)?)
	}

	#[inline]
	pub fn map_type(&self) -> MapType {
		self.map_type
	}

	#[inline]
	pub fn header(&self) -> &BspHeader {
		&self.header
	}

	#[inline]
	pub fn raw(&self) -> &RawBsp {
		&self.raw
	}

	/// Reinterprets the file as `map_type`. Every decoded lump and directory entry is dropped, as slots and layouts differ between
	/// variants.
	///
	/// The header is re-read from the file's bytes. If they don't hold a header of the new variant, an empty one is used.
	pub fn set_map_type(&mut self, map_type: MapType) -> BspResult<()> {
		if map_type == self.map_type {
			return Ok(());
		}
		self.raw.set_map_type(map_type)?;
		self.header = if map_type.is_undefined() {
			BspHeader::default()
		} else {
			Self::read_header(&self.raw, map_type).unwrap_or_else(|err| {
				log::warn!("File has no {map_type} header ({err}), starting from an empty one");
				BspHeader::empty(map_type)
			})
		};
		log::debug!("Changed variant from {} to {map_type}", self.map_type);
		self.map_type = map_type;
		self.infos = slots(map_type);
		self.lumps = slots(map_type);
		Ok(())
	}

	/// The directory entry of slot `index`. Source and Titanfall external lump files take precedence over the header.
	pub fn lump_info_at(&self, index: usize) -> BspResult<&LumpInfo> {
		let cell = self.infos.get(index).ok_or(BspError::LumpIndexOutOfRange {
			index,
			num_lumps: self.infos.len(),
			map_type: self.map_type,
		})?;
		if let Some(info) = cell.get() {
			return Ok(info);
		}

		let has_lump_files = self.map_type.is_subtype_of(MapType::Source) || self.map_type == MapType::Titanfall;
		let info = match self.raw.lump_file_info(index) {
			Some(info) if has_lump_files => {
				log::trace!("Lump {index} is read from {:?}", info.external_file);
				info.clone()
			}
			_ => self.header.lump_info(index)?,
		};
		Ok(cell.get_or_init(|| info))
	}

	/// The directory entry of `kind`, `None` if the variant has no such lump.
	pub fn lump_info(&self, kind: LumpKind) -> BspResult<Option<&LumpInfo>> {
		kind.index(self.map_type).map(|index| self.lump_info_at(index)).transpose()
	}

	/// Overrides the directory entry of `kind`. Only the version, flags and ident are kept when writing, offsets and lengths are
	/// recomputed.
	pub fn set_lump_info(&mut self, kind: LumpKind, info: LumpInfo) -> BspResult<()> {
		let index = self.slot(kind)?;
		self.infos[index] = OnceCell::from(info);
		Ok(())
	}

	fn slot(&self, kind: LumpKind) -> BspResult<usize> {
		kind.index(self.map_type).ok_or(BspError::UnsupportedMapType {
			what: kind.into(),
			map_type: self.map_type,
			version: 0,
		})
	}

	fn load(&self, kind: LumpKind, index: usize) -> BspResult<&LumpData> {
		if let Some(data) = self.lumps[index].get() {
			return Ok(data);
		}

		let info = self.lump_info_at(index)?;
		let bytes = self.raw.read_lump(info).job(|| format!("Reading {kind} lump"))?;
		let data = match kind {
			LumpKind::GameLump => GameLump::parse(&bytes, info, self.map_type).map(LumpData::GameLump),
			_ => LumpData::parse(kind, &bytes, LumpContext::new(self.map_type, info.version)),
		}
		.job(|| format!("Parsing {kind} lump"))?;
		log::debug!("Decoded {kind} lump (slot {index}, {} bytes) into {} elements", bytes.len(), data.count());

		Ok(self.lumps[index].get_or_init(|| data))
	}

	/// The decoded lump of `kind`, decoding it on first access. `None` if the variant has no such lump.
	pub fn lump(&self, kind: LumpKind) -> BspResult<Option<&LumpData>> {
		match kind.index(self.map_type) {
			Some(index) => self.load(kind, index).map(Some),
			None => Ok(None),
		}
	}

	pub fn lump_mut(&mut self, kind: LumpKind) -> BspResult<Option<&mut LumpData>> {
		let Some(index) = kind.index(self.map_type) else { return Ok(None) };
		self.load(kind, index)?;
		Ok(self.lumps[index].get_mut())
	}

	/// The decoded lump of `kind` if it has been decoded or set, without decoding it.
	pub fn loaded(&self, kind: LumpKind) -> Option<&LumpData> {
		kind.index(self.map_type).and_then(|index| self.lumps[index].get())
	}

	#[inline]
	pub fn is_loaded(&self, kind: LumpKind) -> bool {
		self.loaded(kind).is_some()
	}

	/// Replaces the lump of `kind`. Records decoded for another variant are converted when written.
	pub fn set_lump(&mut self, kind: LumpKind, data: LumpData) -> BspResult<()> {
		let index = self.slot(kind)?;
		log::debug!("Set {kind} lump with {} elements", data.count());
		self.lumps[index] = OnceCell::from(data);
		Ok(())
	}

	/// The lump of `kind` as records of type `T`. `None` if the variant doesn't have the lump, or it doesn't hold `T`s.
	pub fn records<T: StoredLump>(&self, kind: LumpKind) -> BspResult<Option<&Lump<T>>> {
		Ok(self.lump(kind)?.and_then(T::peel))
	}

	pub fn records_mut<T: StoredLump>(&mut self, kind: LumpKind) -> BspResult<Option<&mut Lump<T>>> {
		Ok(self.lump_mut(kind)?.and_then(T::peel_mut))
	}

	record_lumps! {
		planes, planes_mut: Plane = Planes;
		vertices, vertices_mut: Vertex = Vertices;
		/// Nightfire's vertex normals.
		normals, normals_mut: Vec3 = Normals;
		/// CoD's curved surface control points.
		patch_vertices, patch_vertices_mut: Vec3 = PatchVertices;
		brushes, brushes_mut: Brush = Brushes;
		brush_sides, brush_sides_mut: BrushSide = BrushSides;
		texture_data, texture_data_mut: TextureData = TextureData;
		displacements, displacements_mut: Displacement = Displacements;
		displacement_vertices, displacement_vertices_mut: DisplacementVertex = DisplacementVertices;
	}

	pub fn entities(&self) -> BspResult<Option<&Entities>> {
		Ok(match self.lump(LumpKind::Entities)? {
			Some(LumpData::Entities(entities)) => Some(entities),
			_ => None,
		})
	}

	pub fn entities_mut(&mut self) -> BspResult<Option<&mut Entities>> {
		Ok(match self.lump_mut(LumpKind::Entities)? {
			Some(LumpData::Entities(entities)) => Some(entities),
			_ => None,
		})
	}

	pub fn game_lump(&self) -> BspResult<Option<&GameLump>> {
		Ok(match self.lump(LumpKind::GameLump)? {
			Some(LumpData::GameLump(game_lump)) => Some(game_lump),
			_ => None,
		})
	}

	pub fn game_lump_mut(&mut self) -> BspResult<Option<&mut GameLump>> {
		Ok(match self.lump_mut(LumpKind::GameLump)? {
			Some(LumpData::GameLump(game_lump)) => Some(game_lump),
			_ => None,
		})
	}

	/// A lump of plain integers, like [`LumpKind::LeafBrushes`].
	pub fn numbers(&self, kind: LumpKind) -> BspResult<Option<&NumList>> {
		Ok(match self.lump(kind)? {
			Some(LumpData::Numbers(list)) => Some(list),
			_ => None,
		})
	}

	pub fn numbers_mut(&mut self, kind: LumpKind) -> BspResult<Option<&mut NumList>> {
		Ok(match self.lump_mut(kind)? {
			Some(LumpData::Numbers(list)) => Some(list),
			_ => None,
		})
	}

	/// The bytes of a lump this crate doesn't interpret, like [`LumpKind::Visibility`].
	pub fn raw_lump(&self, kind: LumpKind) -> BspResult<Option<&[u8]>> {
		Ok(match self.lump(kind)? {
			Some(LumpData::Raw(bytes)) => Some(bytes.as_slice()),
			_ => None,
		})
	}

	/// The run of `T` elements `record` owns, looked up in the current contents of `T`'s lump.
	///
	/// `None` if the record's variant doesn't store the run, or the variant has no such lump. Errors if the run is out of bounds.
	pub fn referenced<T: LumpTarget, R: LumpRange<T>>(&self, record: &R) -> BspResult<Option<&[T::Element]>> {
		let (Some(first), Some(count)) = (record.first_index(), record.count()) else { return Ok(None) };
		let Some(elements) = self.lump(T::KIND)?.and_then(T::elements) else { return Ok(None) };

		let range = usize::try_from(first)
			.ok()
			.zip(usize::try_from(count).ok())
			.and_then(|(first, count)| Some(first..first.checked_add(count)?))
			.filter(|range| range.end <= elements.len());
		match range {
			Some(range) => Ok(Some(&elements[range])),
			None => Err(BspError::IndexOutOfBounds {
				lump: T::KIND.into(),
				index: first.saturating_add(count.max(1) - 1),
				len: elements.len(),
			}),
		}
	}

	/// The header [`write`](Self::write) would produce, without changing anything.
	pub fn regenerate_header(&self) -> BspResult<BspHeader> {
		BspWriter::new(self).regenerate_header()
	}

	/// Serializes the whole file. Afterwards the document reads from the written bytes, with its decoded lumps kept.
	pub fn write(&mut self) -> BspResult<Vec<u8>> {
		let (header, bytes) = BspWriter::new(self).write()?;
		self.raw.replace_bytes(Arc::from(bytes.as_slice()));
		self.header = header;
		self.infos = slots(self.map_type);
		Ok(bytes)
	}
}
