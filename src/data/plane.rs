//! Planes, shared by nodes, brush sides and collision.

use crate::{
	layout::{select, Family::*, Rule},
	lump::{LumpContext, LumpObject},
	prelude::*,
	reader::{BspByteReader, BspByteWriter},
};

static LENGTHS: &[Rule<usize>] = &[
	Rule::new(&[Of(MapType::Quake), Of(MapType::Quake2), Of(MapType::Source), Is(MapType::Nightfire), Is(MapType::Titanfall)], 20),
	Rule::new(&[Of(MapType::Quake3)], 16),
];

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plane {
	pub normal: Vec3,
	pub dist: f32,
	/// Raw plane type, only stored by variants with 20-byte planes. See [`PlaneType`].
	pub ty: Option<i32>,
}

impl Plane {
	/// Creates a plane, computing its type from `normal`.
	pub fn new(normal: Vec3, dist: f32) -> Self {
		Self {
			normal,
			dist,
			ty: Some(PlaneType::from_normal(normal) as i32),
		}
	}

	pub fn plane_type(&self) -> PlaneType {
		self.ty.and_then(PlaneType::from_raw).unwrap_or(PlaneType::from_normal(self.normal))
	}

	/// `>0` = front, `<0` = back, `0` = on plane
	pub fn point_side(&self, point: Vec3) -> f32 {
		let plane_axis = self.plane_type() as usize;

		// If the plane lies on a cardinal axis, the computation is much simpler.
		if plane_axis < 3 {
			point[plane_axis] - self.dist
		} else {
			(self.normal.as_dvec3().dot(point.as_dvec3()) - self.dist as f64) as f32
		}
	}
}

impl LumpObject for Plane {
	const NAME: &'static str = "Plane";

	fn struct_len(ctx: LumpContext) -> BspResult<usize> {
		select(LENGTHS, ctx, 0).ok_or(BspError::UnsupportedMapType {
			what: Self::NAME,
			map_type: ctx.map_type,
			version: ctx.version,
		})
	}

	fn parse(data: &[u8], _ctx: LumpContext) -> BspResult<Self> {
		let mut reader = BspByteReader::new(data);
		Ok(Self {
			normal: reader.read().job("normal")?,
			dist: reader.read().job("dist")?,
			ty: if reader.is_empty() { None } else { Some(reader.read().job("type")?) },
		})
	}

	fn write(&self, ctx: LumpContext, writer: &mut BspByteWriter) -> BspResult<()> {
		writer.write(&self.normal);
		writer.write(&self.dist);
		if Self::struct_len(ctx)? >= 20 {
			writer.write(&self.ty.unwrap_or(PlaneType::from_normal(self.normal) as i32));
		}
		Ok(())
	}

	fn convert(&self, _ctx: LumpContext) -> BspResult<Self> {
		Ok(*self)
	}
}

/// Type of plane depending on normal vector.
///
/// Referenced from [this specification](https://www.gamers.org/dEngine/quake/spec/quake-spec34/qkspec_4.htm#BL1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(i32)]
pub enum PlaneType {
	/// Axial plane, in X
	AxialX = 0,
	/// Axial plane, in Y
	AxialY = 1,
	/// Axial plane, in Z
	AxialZ = 2,
	/// Non axial plane, roughly toward X
	AroundX = 3,
	/// Non axial plane, roughly toward Y
	AroundY = 4,
	/// Non axial plane, roughly toward Z
	AroundZ = 5,
}

impl PlaneType {
	pub fn from_raw(value: i32) -> Option<Self> {
		Some(match value {
			0 => Self::AxialX,
			1 => Self::AxialY,
			2 => Self::AxialZ,
			3 => Self::AroundX,
			4 => Self::AroundY,
			5 => Self::AroundZ,
			_ => return None,
		})
	}

	pub fn from_normal(normal: Vec3) -> Self {
		let abs = normal.abs();
		if abs.x == 1.0 {
			Self::AxialX
		} else if abs.y == 1.0 {
			Self::AxialY
		} else if abs.z == 1.0 {
			Self::AxialZ
		} else if abs.x >= abs.y && abs.x >= abs.z {
			Self::AroundX
		} else if abs.y >= abs.z {
			Self::AroundY
		} else {
			Self::AroundZ
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn plane_types() {
		assert_eq!(Plane::new(Vec3::NEG_Y, 4.0).ty, Some(1));
		assert_eq!(PlaneType::from_normal(Vec3::new(0.6, 0.0, 0.8)), PlaneType::AroundZ);
		assert_eq!(PlaneType::from_normal(Vec3::new(-0.8, 0.6, 0.0)), PlaneType::AroundX);
	}

	#[test]
	fn layouts() {
		let plane = Plane::new(Vec3::Z, 64.0);
		let mut writer = BspByteWriter::new();
		plane.write(LumpContext::of(MapType::Quake3), &mut writer).unwrap();
		assert_eq!(writer.len(), 16);

		let parsed = Plane::parse(writer.as_bytes(), LumpContext::of(MapType::Quake3)).unwrap();
		assert_eq!((parsed.normal, parsed.dist, parsed.ty), (Vec3::Z, 64.0, None));
		assert_eq!(parsed.point_side(Vec3::new(5.0, 5.0, 70.0)), 6.0);

		let mut writer = BspByteWriter::new();
		parsed.write(LumpContext::of(MapType::Source20), &mut writer).unwrap();
		assert_eq!(&writer.as_bytes()[16..], &2_i32.to_le_bytes());
	}
}
