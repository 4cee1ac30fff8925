use crate::{
	layout::{select, Family::*, Rule},
	lump::{LumpContext, LumpObject},
	prelude::*,
	reader::{BspByteReader, BspByteWriter},
};

/// Which fields a vertex record has, in what order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VertexLayout {
	/// Only a position, 12 bytes.
	Position,
	/// Position, two UVs, normal, color. 44 bytes.
	Quake3,
	/// Position, two UVs, a single float, color, normal. 48 bytes.
	Stef2,
	/// Position, four UVs, split tangent, normal, color, padding. 80 bytes.
	Raven,
	/// Position, normal, color, two UVs, tangent, third UV. 68 bytes.
	CoD2,
}

impl VertexLayout {
	const fn len(self) -> usize {
		match self {
			Self::Position => 12,
			Self::Quake3 => 44,
			Self::Stef2 => 48,
			Self::Raven => 80,
			Self::CoD2 => 68,
		}
	}
}

static LAYOUTS: &[Rule<VertexLayout>] = &[
	Rule::new(
		&[Of(MapType::Quake), Of(MapType::Quake2), Is(MapType::Nightfire), Of(MapType::Source), Is(MapType::Titanfall)],
		VertexLayout::Position,
	),
	Rule::new(&[Is(MapType::CoD2), Is(MapType::CoD4)], VertexLayout::CoD2),
	Rule::new(&[Of(MapType::STEF2)], VertexLayout::Stef2),
	Rule::new(&[Is(MapType::Raven)], VertexLayout::Raven),
	Rule::new(&[Of(MapType::Quake3)], VertexLayout::Quake3),
];

/// A vertex with every attribute any variant stores. Attributes a variant doesn't store keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
	pub position: Vec3,
	pub normal: Vec3,
	/// RGBA
	pub color: [u8; 4],
	pub uvs: [Vec2; 4],
	pub tangent: Vec4,
}

impl Default for Vertex {
	fn default() -> Self {
		Self {
			position: Vec3::ZERO,
			normal: Vec3::NEG_Z,
			color: [255; 4],
			uvs: [Vec2::ZERO; 4],
			tangent: Vec4::new(1.0, 0.0, 0.0, -1.0),
		}
	}
}

impl Vertex {
	pub fn new(position: Vec3) -> Self {
		Self { position, ..Default::default() }
	}

	fn layout(ctx: LumpContext) -> BspResult<VertexLayout> {
		select(LAYOUTS, ctx, 0).ok_or(BspError::UnsupportedMapType {
			what: Self::NAME,
			map_type: ctx.map_type,
			version: ctx.version,
		})
	}
}

impl LumpObject for Vertex {
	const NAME: &'static str = "Vertex";

	fn struct_len(ctx: LumpContext) -> BspResult<usize> {
		Self::layout(ctx).map(VertexLayout::len)
	}

	fn parse(data: &[u8], ctx: LumpContext) -> BspResult<Self> {
		let mut reader = BspByteReader::new(data);
		let mut vertex = Self::new(reader.read().job("position")?);

		match Self::layout(ctx)? {
			VertexLayout::Position => {}
			VertexLayout::Quake3 => {
				vertex.uvs[0] = reader.read()?;
				vertex.uvs[1] = reader.read()?;
				vertex.normal = reader.read()?;
				vertex.color = reader.read()?;
			}
			VertexLayout::Stef2 => {
				vertex.uvs[0] = reader.read()?;
				vertex.uvs[1] = reader.read()?;
				vertex.uvs[2].x = reader.read()?;
				vertex.color = reader.read()?;
				vertex.normal = reader.read()?;
			}
			VertexLayout::Raven => {
				for uv in &mut vertex.uvs {
					*uv = reader.read()?;
				}
				let tangent_xy: Vec2 = reader.read()?;
				vertex.normal = reader.read()?;
				vertex.color = reader.read()?;
				let tangent_zw: Vec2 = reader.read()?;
				vertex.tangent = Vec4::new(tangent_xy.x, tangent_xy.y, tangent_zw.x, tangent_zw.y);
			}
			VertexLayout::CoD2 => {
				vertex.normal = reader.read()?;
				vertex.color = reader.read()?;
				vertex.uvs[0] = reader.read()?;
				vertex.uvs[1] = reader.read()?;
				vertex.tangent = reader.read()?;
				vertex.uvs[2] = reader.read()?;
			}
		}

		Ok(vertex)
	}

	fn write(&self, ctx: LumpContext, writer: &mut BspByteWriter) -> BspResult<()> {
		writer.write(&self.position);

		match Self::layout(ctx)? {
			VertexLayout::Position => {}
			VertexLayout::Quake3 => {
				writer.write(&self.uvs[0]);
				writer.write(&self.uvs[1]);
				writer.write(&self.normal);
				writer.write(&self.color);
			}
			VertexLayout::Stef2 => {
				writer.write(&self.uvs[0]);
				writer.write(&self.uvs[1]);
				writer.write(&self.uvs[2].x);
				writer.write(&self.color);
				writer.write(&self.normal);
			}
			VertexLayout::Raven => {
				writer.write(&self.uvs);
				writer.write(&self.tangent.xy());
				writer.write(&self.normal);
				writer.write(&self.color);
				writer.write(&self.tangent.zw());
				writer.write(&[0xFF_u8; 4]);
			}
			VertexLayout::CoD2 => {
				writer.write(&self.normal);
				writer.write(&self.color);
				writer.write(&self.uvs[0]);
				writer.write(&self.uvs[1]);
				writer.write(&self.tangent);
				writer.write(&self.uvs[2]);
			}
		}

		Ok(())
	}

	fn convert(&self, _ctx: LumpContext) -> BspResult<Self> {
		Ok(*self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> Vertex {
		Vertex {
			position: Vec3::new(1.0, 2.0, 3.0),
			normal: Vec3::Y,
			color: [10, 20, 30, 40],
			uvs: [Vec2::new(0.5, 0.25), Vec2::ONE, Vec2::new(3.0, 4.0), Vec2::new(5.0, 6.0)],
			tangent: Vec4::new(0.0, 1.0, 0.0, 1.0),
		}
	}

	fn encode(vertex: &Vertex, map_type: MapType) -> Vec<u8> {
		let mut writer = BspByteWriter::new();
		vertex.write(LumpContext::of(map_type), &mut writer).unwrap();
		writer.into_bytes()
	}

	#[test]
	fn record_lengths() {
		for (map_type, len) in [
			(MapType::Quake, 12),
			(MapType::Source20, 12),
			(MapType::Quake3, 44),
			(MapType::MOHAA, 44),
			(MapType::CoD, 44),
			(MapType::STEF2Demo, 48),
			(MapType::Raven, 80),
			(MapType::CoD2, 68),
		] {
			assert_eq!(Vertex::struct_len(LumpContext::of(map_type)).unwrap(), len, "{map_type}");
			assert_eq!(encode(&sample(), map_type).len(), len, "{map_type}");
		}
		assert!(Vertex::struct_len(LumpContext::of(MapType::Undefined)).is_err());
	}

	#[test]
	fn raven_keeps_every_attribute() {
		let bytes = encode(&sample(), MapType::Raven);
		assert_eq!(&bytes[76..], &[0xFF; 4]);
		assert_eq!(Vertex::parse(&bytes, LumpContext::of(MapType::Raven)).unwrap(), sample());
	}

	#[test]
	fn missing_attributes_use_defaults() {
		let bytes = encode(&sample(), MapType::Quake3);
		let vertex = Vertex::parse(&bytes, LumpContext::of(MapType::Quake3)).unwrap();
		assert_eq!(vertex.color, [10, 20, 30, 40]);
		assert_eq!(vertex.uvs[2], Vec2::ZERO);
		assert_eq!(vertex.tangent, Vertex::default().tangent);
	}
}
