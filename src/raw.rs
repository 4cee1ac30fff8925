//! Fetching the raw bytes of lumps, from the BSP file itself or from external lump files next to it.

use std::cell::OnceCell;

use anybsp_macros::BspValue;
use regex::Regex;

use crate::{
	prelude::*,
	reader::BspByteReader,
	sniff::{encryption_key, KEY_LEN},
};

/// XORs `data` with a repeating `key`, where `data[0]` sits at byte `start` of the file.
pub fn xor_key_stream(data: &mut [u8], key: &[u8], start: usize) {
	if key.is_empty() {
		return;
	}
	for (i, byte) in data.iter_mut().enumerate() {
		*byte ^= key[(i + start) % key.len()];
	}
}

/// Header of a `<map>_l_<n>.lmp` file.
#[derive(BspValue, Debug, Clone, Copy)]
struct LumpFileHeader {
	offset: i32,
	index: i32,
	version: i32,
	length: i32,
	revision: i32,
}

/// The bytes of a BSP file and whatever is needed to read lumps out of it.
pub struct RawBsp {
	source: Arc<dyn FileSource>,
	/// Path of the BSP file in `source`, if it came from there.
	path: Option<String>,
	bytes: Arc<[u8]>,
	key: Option<[u8; KEY_LEN]>,
	/// Directory entries of external lump files by lump index, found on first use.
	lump_files: OnceCell<HashMap<usize, LumpInfo>>,
	use_lump_files: bool,
}

impl std::fmt::Debug for RawBsp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RawBsp")
			.field("path", &self.path)
			.field("len", &self.bytes.len())
			.field("encrypted", &self.key.is_some())
			.finish_non_exhaustive()
	}
}

impl RawBsp {
	pub fn new(source: Arc<dyn FileSource>, path: Option<String>, bytes: Arc<[u8]>, use_lump_files: bool) -> Self {
		Self {
			source,
			path,
			bytes,
			key: None,
			lump_files: OnceCell::new(),
			use_lump_files,
		}
	}

	/// Reads `path` from `source`.
	pub fn open(source: Arc<dyn FileSource>, path: &str, use_lump_files: bool) -> BspResult<Self> {
		let bytes = source.get_bytes(path).ok_or_else(|| BspError::FileNotFound(path.to_owned()))?;
		Ok(Self::new(source, Some(path.to_owned()), bytes, use_lump_files))
	}

	/// The file's raw bytes, still encrypted if it is.
	#[inline]
	pub fn bytes(&self) -> &[u8] {
		&self.bytes
	}

	#[inline]
	pub fn path(&self) -> Option<&str> {
		self.path.as_deref()
	}

	#[inline]
	pub fn key(&self) -> Option<&[u8; KEY_LEN]> {
		self.key.as_ref()
	}

	/// Loads or drops the decryption key depending on whether `map_type` is encrypted.
	pub fn set_map_type(&mut self, map_type: MapType) -> BspResult<()> {
		self.key = match map_type {
			MapType::TacticalInterventionEncrypted => Some(encryption_key(&self.bytes).job("Reading encryption key")?),
			_ => None,
		};
		Ok(())
	}

	/// Replaces the file contents, e.g. after writing. External lump files are no longer consulted after this, as the new bytes
	/// contain every lump.
	pub fn replace_bytes(&mut self, bytes: Arc<[u8]>) {
		self.bytes = bytes;
		self.use_lump_files = false;
		self.lump_files = OnceCell::new();
	}

	/// The first `len` bytes of the file, decrypted.
	pub fn header_bytes(&self, len: usize) -> BspResult<Vec<u8>> {
		let mut bytes = BspByteReader::new(&self.bytes).read_bytes(len).job("Reading header bytes")?.to_vec();
		if let Some(key) = &self.key {
			xor_key_stream(&mut bytes, key, 0);
		}
		Ok(bytes)
	}

	/// Reads the bytes `info` points to. Empty lumps never touch the file.
	pub fn read_lump(&self, info: &LumpInfo) -> BspResult<Vec<u8>> {
		if info.length == 0 {
			return Ok(Vec::new());
		}

		let file: Arc<[u8]> = match &info.external_file {
			Some(path) => self.source.get_bytes(path).ok_or_else(|| BspError::FileNotFound(path.clone()))?,
			None => self.bytes.clone(),
		};

		let mut bytes = file
			.get(info.range())
			.ok_or_else(|| BspError::LumpOutOfBounds {
				info: info.clone(),
				size: file.len(),
			})?
			.to_vec();

		if let Some(key) = &self.key {
			if info.external_file.is_none() {
				xor_key_stream(&mut bytes, key, info.offset as usize);
			}
		}
		Ok(bytes)
	}

	/// The directory entry an external lump file provides for lump `index`, if any.
	pub fn lump_file_info(&self, index: usize) -> Option<&LumpInfo> {
		if !self.use_lump_files {
			return None;
		}
		self.lump_files.get_or_init(|| self.find_lump_files()).get(&index)
	}

	fn find_lump_files(&self) -> HashMap<usize, LumpInfo> {
		let mut lump_files = HashMap::new();
		let Some(path) = &self.path else { return lump_files };
		let base = path.rsplit_once('.').map_or(path.as_str(), |(base, _)| base);

		let Ok(pattern) = Regex::new(r"_._.*\.lmp$") else { return lump_files };
		for file_path in self.source.find_paths(base, Some(&pattern)) {
			let Some(bytes) = self.source.get_bytes(&file_path) else { continue };
			let header: LumpFileHeader = match BspByteReader::new(&bytes).read() {
				Ok(header) => header,
				Err(err) => {
					log::warn!("Skipping lump file {file_path}: {err}");
					continue;
				}
			};
			let Ok(index) = usize::try_from(header.index) else { continue };

			log::trace!("Lump file {file_path} holds lump {index} (revision {})", header.revision);
			lump_files.insert(
				index,
				LumpInfo {
					ident: 0,
					flags: 0,
					version: header.version,
					offset: header.offset as u32,
					length: header.length as u32,
					external_file: Some(file_path),
				},
			);
		}
		lump_files
	}
}
