//! Serializing a [`Bsp`] back into a file.

use crate::{header::BspHeader, prelude::*, raw::xor_key_stream, reader::BspByteWriter};

/// Lays out the lumps of a [`Bsp`] behind a regenerated header.
///
/// Decoded lumps are re-encoded, the rest are copied from the source file as they are. The game lump is always re-encoded when it decodes,
/// since its entries may point at absolute file offsets that move with it.
pub struct BspWriter<'a> {
	bsp: &'a Bsp,
}

impl<'a> BspWriter<'a> {
	pub fn new(bsp: &'a Bsp) -> Self {
		Self { bsp }
	}

	/// Directory entry and bytes of slot `index`, where a game lump in it will start at byte `offset`.
	fn encode_slot(&self, index: usize, offset: usize) -> BspResult<(LumpInfo, Vec<u8>)> {
		let map_type = self.bsp.map_type();
		let info = self.bsp.lump_info_at(index)?;
		let ctx = LumpContext::new(map_type, info.version);

		let bytes = match LumpKind::for_index(index, map_type) {
			Some(LumpKind::GameLump) => match self.bsp.game_lump() {
				// Keep empty game lumps empty.
				Ok(Some(game_lump)) if !(game_lump.entries().is_empty() && info.is_empty()) => game_lump.to_bytes(map_type, offset)?,
				Ok(_) => Vec::new(),
				// Only an untouched game lump can fail to decode here.
				Err(err) => {
					log::warn!("Copying game lump that doesn't decode as is, its entry offsets may be stale: {err}");
					self.bsp.raw().read_lump(info)?
				}
			},
			Some(kind) => match self.bsp.loaded(kind) {
				Some(data) => data.to_bytes(ctx, kind.num_type(map_type), offset)?,
				None => self.bsp.raw().read_lump(info)?,
			},
			None => self.bsp.raw().read_lump(info)?,
		};

		let info = LumpInfo {
			ident: info.ident,
			flags: info.flags,
			version: info.version,
			offset: 0,
			length: bytes.len() as u32,
			external_file: None,
		};
		Ok((info, bytes))
	}

	fn encode_all(&self) -> BspResult<Vec<(LumpInfo, Vec<u8>)>> {
		let map_type = self.bsp.map_type();
		if map_type.is_undefined() {
			return Err(BspError::UnsupportedMapType {
				what: "Writing a BSP file",
				map_type,
				version: 0,
			});
		}
		(0..map_type.num_lumps())
			.map(|index| self.encode_slot(index, 0).job(|| format!("Encoding lump {index}")))
			.collect()
	}

	/// The header of the written file.
	pub fn regenerate_header(&self) -> BspResult<BspHeader> {
		let slots = self.encode_all()?;
		let infos: Vec<LumpInfo> = slots.into_iter().map(|(info, _)| info).collect();
		Ok(self.bsp.header().regenerate(&infos))
	}

	/// Encodes every lump and lays them out behind a new header. Nothing is returned unless every lump encodes.
	pub fn write(&self) -> BspResult<(BspHeader, Vec<u8>)> {
		let map_type = self.bsp.map_type();
		let mut slots = self.encode_all()?;
		let infos: Vec<LumpInfo> = slots.iter().map(|(info, _)| info.clone()).collect();
		let header = self.bsp.header().regenerate(&infos);

		// The game lump's length doesn't depend on where it is, but absolute entry offsets do.
		if let Some(index) = LumpKind::GameLump.index(map_type) {
			let offset = header.lump_info(index)?.offset as usize;
			if offset != 0 {
				slots[index] = self.encode_slot(index, offset).job("Encoding game lump")?;
			}
		}

		let total = header.len() + slots.iter().map(|(_, bytes)| bytes.len().next_multiple_of(4)).sum::<usize>();
		let mut writer = BspByteWriter::with_capacity(total);
		writer.write_bytes(header.as_bytes());
		for (index, (_, bytes)) in slots.iter().enumerate() {
			if bytes.is_empty() {
				continue;
			}
			let offset = header.lump_info(index)?.offset as usize;
			writer.pad_to(offset);
			writer.write_bytes(bytes);
		}
		let mut bytes = writer.into_bytes();

		if let Some(key) = self.bsp.raw().key() {
			xor_key_stream(&mut bytes, key, 0);
		}
		log::debug!("Wrote {map_type} BSP of {} bytes, {} lumps with data", bytes.len(), infos.iter().filter(|info| !info.is_empty()).count());
		Ok((header, bytes))
	}
}
