//! The static prop game lump (`prps`) of Source and Titanfall maps.

use crate::{
	data::util::FixedStr,
	layout::{record_fields, select, Family, Family::*, Field, RawRecord, Rule},
	lump::{LumpContext, LumpObject},
	map_type::MapType::*,
	prelude::*,
	reader::{BspByteReader, BspByteWriter},
};

const FAMILIES: &[Family] = &[Of(Source), Is(Titanfall)];

const V4_12: &[i32] = &[4, 5, 6, 7, 8, 9, 10, 11, 12];
const V4_11: &[i32] = &[4, 5, 6, 7, 8, 9, 10, 11];
const V5_12: &[i32] = &[5, 6, 7, 8, 9, 10, 11, 12];
const V7_12: &[i32] = &[7, 8, 9, 10, 11, 12];
const V8_12: &[i32] = &[8, 9, 10, 11, 12];
const V9: &[i32] = &[9];

/// Some version 9 lumps have 76 byte props, with 4 extra bytes after the flags.
const V9_WIDE: usize = 76;

/// Length of a new prop for each lump version.
static DEFAULT_LENGTHS: &[Rule<usize>] = &[
	Rule::versioned(FAMILIES, &[4], 56),
	Rule::versioned(FAMILIES, &[5], 60),
	Rule::versioned(FAMILIES, &[6], 64),
	Rule::versioned(FAMILIES, &[7, 8], 68),
	Rule::versioned(FAMILIES, &[9], 72),
	Rule::versioned(FAMILIES, &[10], 76),
	Rule::versioned(FAMILIES, &[11], 80),
	Rule::new(FAMILIES, 192),
];

static ORIGIN: &[Rule<Field>] = &[Rule::versioned(FAMILIES, V4_12, Field::Vec3(0))];
static ANGLES: &[Rule<Field>] = &[Rule::versioned(FAMILIES, V4_12, Field::Vec3(12))];
static MODEL_INDEX: &[Rule<Field>] = &[Rule::versioned(FAMILIES, V4_12, Field::I16(24))];
static FIRST_LEAF: &[Rule<Field>] = &[Rule::versioned(&[Of(Source)], V4_11, Field::I16(26))];
static NUM_LEAVES: &[Rule<Field>] = &[Rule::versioned(&[Of(Source)], V4_11, Field::I16(28))];
static SOLIDITY: &[Rule<Field>] = &[Rule::versioned(FAMILIES, V4_12, Field::U8(30))];
static FLAGS: &[Rule<Field>] = &[Rule::versioned(FAMILIES, V4_12, Field::U8(31))];
static SKIN: &[Rule<Field>] = &[Rule::sized(FAMILIES, V9, V9_WIDE, Field::I32(36)), Rule::versioned(FAMILIES, V4_12, Field::I32(32))];
static MIN_FADE: &[Rule<Field>] = &[Rule::sized(FAMILIES, V9, V9_WIDE, Field::F32(40)), Rule::versioned(FAMILIES, V4_12, Field::F32(36))];
static MAX_FADE: &[Rule<Field>] = &[Rule::sized(FAMILIES, V9, V9_WIDE, Field::F32(44)), Rule::versioned(FAMILIES, V4_12, Field::F32(40))];
static LIGHTING_ORIGIN: &[Rule<Field>] = &[
	Rule::sized(FAMILIES, V9, V9_WIDE, Field::Vec3(48)),
	Rule::versioned(FAMILIES, V4_12, Field::Vec3(44)),
];
static FORCED_FADE_SCALE: &[Rule<Field>] = &[
	Rule::sized(FAMILIES, V9, V9_WIDE, Field::F32(60)),
	Rule::versioned(FAMILIES, V5_12, Field::F32(56)),
];
static MIN_DX_LEVEL: &[Rule<Field>] = &[Rule::versioned(&[Of(Source)], &[6, 7], Field::I16(60))];
static MAX_DX_LEVEL: &[Rule<Field>] = &[Rule::versioned(&[Of(Source)], &[6, 7], Field::I16(62))];
static MIN_CPU_LEVEL: &[Rule<Field>] = &[Rule::sized(FAMILIES, V9, V9_WIDE, Field::U8(64)), Rule::versioned(FAMILIES, V8_12, Field::U8(60))];
static MAX_CPU_LEVEL: &[Rule<Field>] = &[Rule::sized(FAMILIES, V9, V9_WIDE, Field::U8(65)), Rule::versioned(FAMILIES, V8_12, Field::U8(61))];
static MIN_GPU_LEVEL: &[Rule<Field>] = &[Rule::sized(FAMILIES, V9, V9_WIDE, Field::U8(66)), Rule::versioned(FAMILIES, V8_12, Field::U8(62))];
static MAX_GPU_LEVEL: &[Rule<Field>] = &[Rule::sized(FAMILIES, V9, V9_WIDE, Field::U8(67)), Rule::versioned(FAMILIES, V8_12, Field::U8(63))];
static DIFFUSE_MODULATION: &[Rule<Field>] = &[
	Rule::sized(FAMILIES, V9, V9_WIDE, Field::Rgba(69)),
	Rule::versioned(FAMILIES, V7_12, Field::Rgba(64)),
];
static SCALE: &[Rule<Field>] = &[Rule::versioned(&[Of(Source)], &[11], Field::F32(76))];

pub const MODEL_NAME_LEN: usize = 128;

/// A model placed in the world, baked into the map.
///
/// Prop records have no fixed length: their length is whatever is left of the lump after the dictionaries, divided by the prop count.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticProp {
	raw: RawRecord,
}

impl StaticProp {
	/// A zeroed prop for `ctx`, with the usual length of its lump version.
	pub fn new(ctx: LumpContext) -> BspResult<Self> {
		let len = select(DEFAULT_LENGTHS, ctx, 0).ok_or(BspError::UnsupportedMapType {
			what: Self::NAME,
			map_type: ctx.map_type,
			version: ctx.version,
		})?;
		Ok(Self {
			raw: RawRecord::zeroed(ctx, len),
		})
	}

	#[inline]
	pub fn context(&self) -> LumpContext {
		self.raw.ctx()
	}

	#[inline]
	pub fn as_bytes(&self) -> &[u8] {
		self.raw.data()
	}

	record_fields! {
		origin, set_origin: Vec3 = ORIGIN;
		/// Pitch, yaw, roll in degrees.
		angles, set_angles: Vec3 = ANGLES;
		/// Index into [`StaticProps::model_names`].
		model_index, set_model_index: i32 = MODEL_INDEX;
		/// Index into [`StaticProps::leaf_indices`].
		first_leaf, set_first_leaf: i32 = FIRST_LEAF;
		num_leaves, set_num_leaves: i32 = NUM_LEAVES;
		solidity, set_solidity: u8 = SOLIDITY;
		flags, set_flags: u8 = FLAGS;
		skin, set_skin: i32 = SKIN;
		min_fade_distance, set_min_fade_distance: f32 = MIN_FADE;
		max_fade_distance, set_max_fade_distance: f32 = MAX_FADE;
		lighting_origin, set_lighting_origin: Vec3 = LIGHTING_ORIGIN;
		forced_fade_scale, set_forced_fade_scale: f32 = FORCED_FADE_SCALE;
		min_dx_level, set_min_dx_level: i32 = MIN_DX_LEVEL;
		max_dx_level, set_max_dx_level: i32 = MAX_DX_LEVEL;
		min_cpu_level, set_min_cpu_level: u8 = MIN_CPU_LEVEL;
		max_cpu_level, set_max_cpu_level: u8 = MAX_CPU_LEVEL;
		min_gpu_level, set_min_gpu_level: u8 = MIN_GPU_LEVEL;
		max_gpu_level, set_max_gpu_level: u8 = MAX_GPU_LEVEL;
		/// RGBA
		diffuse_modulation, set_diffuse_modulation: [u8; 4] = DIFFUSE_MODULATION;
		scale, set_scale: f32 = SCALE;
	}

	/// Some Source 20 maps append a name to version 5 and 6 props, in their last 128 bytes.
	fn has_name(&self) -> bool {
		let ctx = self.raw.ctx();
		ctx.map_type == Source20 && matches!(ctx.version, 5 | 6) && self.raw.data().len() > MODEL_NAME_LEN
	}

	pub fn name(&self) -> Option<String> {
		if !self.has_name() {
			return None;
		}
		let data = self.raw.data();
		Some(null_terminated_str(&data[data.len() - MODEL_NAME_LEN..]))
	}

	/// Returns `false` if this prop has no name. Names longer than 128 bytes are cut off.
	pub fn set_name(&mut self, name: &str) -> bool {
		if !self.has_name() {
			return false;
		}
		let data = self.raw.data_mut();
		let start = data.len() - MODEL_NAME_LEN;
		let tail = &mut data[start..];
		tail.fill(0);
		let len = name.len().min(MODEL_NAME_LEN);
		tail[..len].copy_from_slice(&name.as_bytes()[..len]);
		true
	}

	fn copy_fields(&self, to: &mut Self) {
		self.copy_record_fields(to);
		if let Some(name) = self.name() {
			to.set_name(&name);
		}
	}
}

impl LumpObject for StaticProp {
	const NAME: &'static str = "StaticProp";

	fn struct_len(_ctx: LumpContext) -> BspResult<usize> {
		Err(BspError::VariableLengthLump(Self::NAME))
	}

	fn parse(data: &[u8], ctx: LumpContext) -> BspResult<Self> {
		Ok(Self {
			raw: RawRecord::new(ctx, data.to_vec()),
		})
	}

	fn write(&self, ctx: LumpContext, writer: &mut BspByteWriter) -> BspResult<()> {
		if self.raw.ctx() == ctx {
			writer.write_bytes(self.raw.data());
		} else {
			writer.write_bytes(self.convert(ctx)?.raw.data());
		}
		Ok(())
	}

	fn convert(&self, ctx: LumpContext) -> BspResult<Self> {
		if self.raw.ctx() == ctx {
			return Ok(self.clone());
		}
		let mut out = Self::new(ctx)?;
		self.copy_fields(&mut out);
		Ok(out)
	}
}

/// The contents of a `prps` game lump.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticProps {
	/// Model paths props index into.
	pub model_names: Vec<FixedStr<MODEL_NAME_LEN>>,
	/// BSP leaves props are in. Props own runs of these.
	pub leaf_indices: Vec<i16>,
	/// Per-prop scales of Vindictus version 6 and up lumps, kept as is.
	pub prop_scales: Vec<[u8; 16]>,
	/// Unknown bytes following the prop count in version 12 lumps.
	pub extra: Option<[u8; 8]>,
	pub props: Vec<StaticProp>,
	/// Bytes after the last prop that don't make up a whole one. Written back as long as the layout stays the same.
	pub remainder: Vec<u8>,
	/// The variant and game lump version this lump was decoded with.
	pub ctx: LumpContext,
}

impl StaticProps {
	pub fn new(ctx: LumpContext) -> Self {
		Self {
			model_names: Vec::new(),
			leaf_indices: Vec::new(),
			prop_scales: Vec::new(),
			extra: (ctx.version == 12).then_some([0; 8]),
			props: Vec::new(),
			remainder: Vec::new(),
			ctx,
		}
	}

	fn has_prop_scales(ctx: LumpContext) -> bool {
		ctx.map_type == Vindictus && ctx.version >= 6
	}

	/// `ctx` carries the version of the game lump entry.
	pub fn parse(data: &[u8], ctx: LumpContext) -> BspResult<Self> {
		let mut props = Self::new(ctx);
		if data.is_empty() {
			return Ok(props);
		}

		let mut reader = BspByteReader::new(data);
		let count: i32 = reader.read().job("Reading model dictionary length")?;
		for i in 0..count.max(0) {
			props.model_names.push(reader.read().job(|| format!("Reading model name {i}"))?);
		}

		let count: i32 = reader.read().job("Reading leaf index count")?;
		for _ in 0..count.max(0) {
			props.leaf_indices.push(reader.read().job("Reading leaf indices")?);
		}

		if Self::has_prop_scales(ctx) {
			let count: i32 = reader.read().job("Reading prop scale count")?;
			for _ in 0..count.max(0) {
				props.prop_scales.push(reader.read().job("Reading prop scales")?);
			}
		}

		let count: i32 = reader.read().job("Reading prop count")?;
		if ctx.version == 12 {
			props.extra = Some(reader.read().job("Reading version 12 header")?);
		}

		let count = count.max(0) as usize;
		if count == 0 {
			return Ok(props);
		}
		let rest = reader.read_rest();
		let prop_len = rest.len() / count;
		if rest.len() % count != 0 {
			log::warn!("{} bytes of static props don't divide into {count} props, keeping trailing bytes", rest.len());
		}
		if prop_len == 0 {
			return Err(BspError::BufferOutOfBounds {
				from: reader.pos(),
				to: reader.pos() + count,
				size: data.len(),
			});
		}
		log::debug!("{count} static props of {prop_len} bytes, lump version {}", ctx.version);

		for (i, chunk) in rest.chunks_exact(prop_len).take(count).enumerate() {
			props.props.push(StaticProp::parse(chunk, ctx).job(|| format!("Parsing static prop {i}"))?);
		}
		props.remainder = rest[prop_len * count..].to_vec();
		Ok(props)
	}

	/// Encodes the lump for `ctx`, converting props if it differs from the one they were decoded with.
	pub fn to_bytes(&self, ctx: LumpContext) -> BspResult<Vec<u8>> {
		let mut writer = BspByteWriter::new();
		writer.write(&(self.model_names.len() as i32));
		for name in &self.model_names {
			writer.write(name);
		}

		writer.write(&(self.leaf_indices.len() as i32));
		for leaf in &self.leaf_indices {
			writer.write(leaf);
		}

		if Self::has_prop_scales(ctx) {
			writer.write(&(self.prop_scales.len() as i32));
			for scale in &self.prop_scales {
				writer.write(scale);
			}
		}

		writer.write(&(self.props.len() as i32));
		if ctx.version == 12 {
			writer.write(&self.extra.unwrap_or_default());
		}

		for (i, prop) in self.props.iter().enumerate() {
			prop.write(ctx, &mut writer).job(|| format!("Writing static prop {i}"))?;
		}
		if ctx == self.ctx {
			writer.write_bytes(&self.remainder);
		}
		Ok(writer.into_bytes())
	}

	/// The model path of `prop`.
	pub fn model_name(&self, prop: &StaticProp) -> Option<&str> {
		let index = usize::try_from(prop.model_index()?).ok()?;
		self.model_names.get(index).map(FixedStr::as_str)
	}

	/// The leaves `prop` is in.
	pub fn leaves_of(&self, prop: &StaticProp) -> Option<&[i16]> {
		let first = usize::try_from(prop.first_leaf()?).ok()?;
		let count = usize::try_from(prop.num_leaves()?).ok()?;
		self.leaf_indices.get(first..first.checked_add(count)?)
	}
}
