//! End-to-end tests over synthetic files built in memory.

use std::cell::Cell;

use regex::Regex;

use crate::{
	data::{game_lump::GameLumpEntry, plane::PlaneType, static_props::StaticProp},
	header::BspHeader,
	lump::LumpObject,
	raw::xor_key_stream,
	sniff::{KEY_LEN, KEY_OFFSET},
	*,
};

/// Lays `lumps` out in slot order behind a header of `map_type`.
fn build(map_type: MapType, lumps: Vec<(LumpKind, Vec<u8>)>) -> Vec<u8> {
	let mut datas = vec![Vec::new(); map_type.num_lumps()];
	for (kind, bytes) in lumps {
		datas[kind.index(map_type).unwrap()] = bytes;
	}
	let infos: Vec<LumpInfo> = datas
		.iter()
		.map(|data| LumpInfo {
			length: data.len() as u32,
			..Default::default()
		})
		.collect();

	let header = BspHeader::empty(map_type).regenerate(&infos);
	let mut bytes = header.as_bytes().to_vec();
	for (index, data) in datas.iter().enumerate() {
		if data.is_empty() {
			continue;
		}
		bytes.resize(header.lump_info(index).unwrap().offset as usize, 0);
		bytes.extend(data);
	}
	bytes
}

fn plane_bytes(planes: &[(Vec3, f32)]) -> Vec<u8> {
	let mut bytes = Vec::new();
	for (normal, dist) in planes {
		for v in [normal.x, normal.y, normal.z, *dist] {
			bytes.extend(v.to_le_bytes());
		}
		bytes.extend((PlaneType::from_normal(*normal) as i32).to_le_bytes());
	}
	bytes
}

const WORLDSPAWN: &[u8] = b"{\n\"classname\" \"worldspawn\"\n\"message\" \"test\"\n}\n\0";

fn parse(bytes: &[u8]) -> Bsp {
	Bsp::parse(bytes, BspSettings::default()).unwrap()
}

#[test]
fn source_planes() {
	// Hand-built, independent of the header writer.
	let mut bytes = b"VBSP".to_vec();
	bytes.extend(20_i32.to_le_bytes());
	let planes = plane_bytes(&[(Vec3::X, 16.0), (Vec3::Y, -8.5), (Vec3::new(0.6, 0.8, 0.0), 100.25)]);
	for slot in 0..64 {
		let (offset, length) = if slot == 1 { (1036, planes.len() as u32) } else { (0, 0) };
		for value in [offset, length, 0, 0] {
			bytes.extend(value.to_le_bytes());
		}
	}
	bytes.extend(7_i32.to_le_bytes());
	bytes.extend(&planes);

	let bsp = parse(&bytes);
	assert_eq!(bsp.map_type(), MapType::Source20);
	let planes = bsp.planes().unwrap().unwrap();
	assert_eq!(planes.len(), 3);
	assert_eq!(planes.iter().map(|plane| plane.dist).collect::<Vec<_>>(), [16.0, -8.5, 100.25]);
	assert_eq!(planes[2].normal, Vec3::new(0.6, 0.8, 0.0));
}

#[test]
fn entities_in_quake() {
	let bytes = build(MapType::Quake, vec![(LumpKind::Entities, b"{\"classname\" \"info_player_start\"}\0".to_vec())]);
	let bsp = parse(&bytes);
	assert_eq!(bsp.map_type(), MapType::Quake);

	let entities = bsp.entities().unwrap().unwrap();
	assert_eq!(entities.len(), 1);
	assert_eq!(entities[0].get("classname"), Some("info_player_start"));
}

/// Counts every file fetch.
struct CountingSource {
	inner: MemoryFileSource,
	fetches: Cell<usize>,
}

impl FileSource for CountingSource {
	fn exists(&self, path: &str) -> bool {
		self.inner.exists(path)
	}

	fn get_bytes(&self, path: &str) -> Option<Arc<[u8]>> {
		self.fetches.set(self.fetches.get() + 1);
		self.inner.get_bytes(path)
	}

	fn find_paths(&self, prefix: &str, pattern: Option<&Regex>) -> Vec<String> {
		self.inner.find_paths(prefix, pattern)
	}
}

#[test]
fn empty_lumps_never_fetch() {
	let source = Arc::new(CountingSource {
		inner: MemoryFileSource::new().with_file("maps/a.bsp", build(MapType::Source20, vec![(LumpKind::Entities, WORLDSPAWN.to_vec())])),
		fetches: Cell::new(0),
	});
	let mut bsp = Bsp::open(source.clone(), "maps/a.bsp", BspSettings::default()).unwrap();
	bsp.set_lump_info(
		LumpKind::Visibility,
		LumpInfo {
			offset: 64,
			length: 0,
			external_file: Some("maps/a_l_4.lmp".into()),
			..Default::default()
		},
	)
	.unwrap();

	let fetches = source.fetches.get();
	assert_eq!(bsp.raw_lump(LumpKind::Visibility).unwrap(), Some(&[][..]));
	assert_eq!(source.fetches.get(), fetches);
}

#[test]
fn cod4_directory_lists_present_lumps() {
	let mut bsp = Bsp::new(MapType::CoD4).unwrap();
	let ctx = LumpContext::of(MapType::CoD4);
	bsp.set_lump(LumpKind::Planes, LumpData::Planes(Lump::from_items(vec![Plane::new(Vec3::Z, 2.0), Plane::new(Vec3::X, 5.0)], ctx)))
		.unwrap();
	bsp.set_lump(LumpKind::Entities, LumpData::Entities(Entities::parse(WORLDSPAWN).unwrap())).unwrap();
	// Set, but empty.
	for kind in [LumpKind::Brushes, LumpKind::BrushSides, LumpKind::Lightmaps] {
		bsp.set_lump(kind, LumpData::Raw(Vec::new())).unwrap();
	}

	let bytes = bsp.write().unwrap();
	assert_eq!(&bytes[..8], b"IBSP\x16\0\0\0");
	assert_eq!(&bytes[8..12], &2_u32.to_le_bytes());
	let directory: Vec<u32> = bytes[12..28].chunks_exact(4).map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap())).collect();
	assert_eq!(directory, [4, 32, 37, WORLDSPAWN.len() as u32]);

	let reparsed = parse(&bytes);
	assert_eq!(reparsed.map_type(), MapType::CoD4);
	assert_eq!(reparsed.lump_info(LumpKind::Planes).unwrap().unwrap().offset, 28);
	assert_eq!(reparsed.lump_info(LumpKind::Entities).unwrap().unwrap().offset, 60);
	assert_eq!(reparsed.planes().unwrap().unwrap()[1].dist, 5.0);
	assert_eq!(reparsed.entities().unwrap().unwrap()[0].get("message"), Some("test"));
}

#[test]
fn sof_is_told_from_quake3() {
	let sof = build(MapType::SoF, vec![(LumpKind::Entities, WORLDSPAWN.to_vec())]);
	assert_eq!(&sof[8..12], &184_u32.to_le_bytes());
	let bsp = parse(&sof);
	assert_eq!(bsp.map_type(), MapType::SoF);
	assert_eq!(bsp.entities().unwrap().unwrap()[0].class_name(), "worldspawn");

	let quake3 = build(MapType::Quake3, vec![(LumpKind::Entities, WORLDSPAWN.to_vec())]);
	assert_eq!(parse(&quake3).map_type(), MapType::Quake3);
}

#[test]
fn cod_brushes_into_source() {
	let mut cod = Bsp::new(MapType::CoD).unwrap();
	let ctx = LumpContext::of(MapType::CoD);
	let mut brushes = Vec::new();
	for (sides, texture) in [(6, 1), (5, 0)] {
		let mut brush = Brush::new(ctx).unwrap();
		brush.set_num_sides(sides);
		brush.set_texture(texture);
		brushes.push(brush);
	}
	cod.set_lump(LumpKind::Brushes, LumpData::Brushes(Lump::from_items(brushes, ctx))).unwrap();
	let cod = parse(&cod.write().unwrap());
	assert_eq!(cod.map_type(), MapType::CoD);
	let brushes = cod.brushes().unwrap().unwrap().clone();
	assert_eq!(brushes[0].as_bytes(), &[6, 0, 1, 0]);

	let mut source = Bsp::new(MapType::Source20).unwrap();
	source.set_lump(LumpKind::Brushes, LumpData::Brushes(brushes)).unwrap();
	let bytes = source.write().unwrap();
	let source = parse(&bytes);
	assert_eq!(source.map_type(), MapType::Source20);

	let brushes = source.brushes().unwrap().unwrap();
	assert_eq!(source.lump_info(LumpKind::Brushes).unwrap().unwrap().length, 24);
	assert_eq!(brushes.iter().map(Brush::num_sides).collect::<Vec<_>>(), [Some(6), Some(5)]);
	assert_eq!(brushes[0].first_side(), Some(0));
	// Source brushes have no texture field.
	assert_eq!(brushes[0].texture(), None);
}

#[test]
fn lumps_decode_once() {
	let bytes = build(MapType::Source20, vec![(LumpKind::Planes, plane_bytes(&[(Vec3::Z, 1.0)]))]);
	let mut bsp = parse(&bytes);
	assert!(!bsp.is_loaded(LumpKind::Planes));

	let first: *const Lump<Plane> = bsp.planes().unwrap().unwrap();
	let second: *const Lump<Plane> = bsp.planes().unwrap().unwrap();
	assert!(std::ptr::eq(first, second));
	assert!(bsp.is_loaded(LumpKind::Planes));
	assert!(!bsp.is_loaded(LumpKind::Entities));

	bsp.planes_mut().unwrap().unwrap()[0].dist = 3.0;
	assert_eq!(bsp.planes().unwrap().unwrap()[0].dist, 3.0);

	bsp.set_map_type(MapType::Source19).unwrap();
	assert!(!bsp.is_loaded(LumpKind::Planes));
	assert_eq!(bsp.planes().unwrap().unwrap()[0].dist, 1.0);

	bsp.set_map_type(MapType::Undefined).unwrap();
	assert!(bsp.planes().unwrap().is_none());
	assert!(bsp.write().is_err());
}

#[test]
fn header_regeneration_is_idempotent() {
	for map_type in [MapType::Source20, MapType::FAKK2, MapType::CoD4, MapType::Titanfall] {
		let bytes = build(map_type, vec![(LumpKind::Entities, WORLDSPAWN.to_vec()), (LumpKind::Planes, plane_bytes(&[(Vec3::X, 1.0)]))]);
		let bsp = Bsp::parse(bytes, BspSettings { map_type: Some(map_type), ..Default::default() }).unwrap();
		let first = bsp.regenerate_header().unwrap();
		assert_eq!(bsp.regenerate_header().unwrap(), first, "{map_type}");
	}
}

#[test]
fn absent_lumps_and_fields() {
	let bsp = parse(&build(MapType::Quake3, vec![(LumpKind::Entities, WORLDSPAWN.to_vec())]));
	assert!(bsp.displacements().unwrap().is_none());
	assert!(bsp.game_lump().unwrap().is_none());
	assert!(bsp.lump_info(LumpKind::TextureData).unwrap().is_none());
	assert!(!bsp.is_loaded(LumpKind::Displacements));
	assert!(bsp.brushes().unwrap().unwrap().is_empty());

	let brush = Brush::new(LumpContext::of(MapType::Quake3)).unwrap();
	assert_eq!(brush.contents(), None);
}

#[test]
fn subtypes_follow_their_family() {
	let family = LumpContext::of(MapType::Source);
	for sub in [MapType::Source17, MapType::Source18, MapType::Source19, MapType::Source20, MapType::L4D2, MapType::Source27] {
		let ctx = LumpContext::of(sub);
		assert_eq!(Brush::struct_len(ctx).unwrap(), Brush::struct_len(family).unwrap(), "{sub}");
		assert_eq!(BrushSide::struct_len(ctx).unwrap(), BrushSide::struct_len(family).unwrap(), "{sub}");
		assert_eq!(TextureData::struct_len(ctx).unwrap(), TextureData::struct_len(family).unwrap(), "{sub}");
		assert_eq!(Plane::struct_len(ctx).unwrap(), Plane::struct_len(family).unwrap(), "{sub}");

		let mut brush = Brush::new(ctx).unwrap();
		brush.set_contents(1);
		let mut in_family = Brush::new(family).unwrap();
		in_family.set_contents(1);
		assert_eq!(brush.as_bytes(), in_family.as_bytes(), "{sub}");
	}
	// Overridden before the family rule.
	assert_ne!(BrushSide::struct_len(LumpContext::of(MapType::Vindictus)).unwrap(), BrushSide::struct_len(family).unwrap());
}

#[test]
fn brush_sides_are_referenced() {
	let ctx = LumpContext::of(MapType::Source20);
	let mut bsp = Bsp::new(MapType::Source20).unwrap();
	let sides = (0..5)
		.map(|plane| {
			let mut side = BrushSide::new(ctx).unwrap();
			side.set_plane(plane);
			side
		})
		.collect();
	bsp.set_lump(LumpKind::BrushSides, LumpData::BrushSides(Lump::from_items(sides, ctx))).unwrap();

	let mut brush = Brush::new(ctx).unwrap();
	brush.set_first_side(1);
	brush.set_num_sides(3);
	let planes: Vec<_> = bsp.referenced::<BrushSide, _>(&brush).unwrap().unwrap().iter().map(BrushSide::plane).collect();
	assert_eq!(planes, [Some(1), Some(2), Some(3)]);

	// Edits to the side lump show up straight away.
	bsp.brush_sides_mut().unwrap().unwrap()[2].set_plane(40);
	assert_eq!(bsp.referenced::<BrushSide, _>(&brush).unwrap().unwrap()[1].plane(), Some(40));

	brush.set_num_sides(5);
	assert!(matches!(bsp.referenced::<BrushSide, _>(&brush), Err(BspError::IndexOutOfBounds { len: 5, .. })));

	// CoD brushes don't know where their sides start.
	let cod = Brush::new(LumpContext::of(MapType::CoD)).unwrap();
	assert!(bsp.referenced::<BrushSide, _>(&cod).unwrap().is_none());
}

fn static_prop_lump(offset: usize) -> Vec<u8> {
	let ctx = LumpContext::new(MapType::Source20, 10);
	let mut props = StaticProps::new(ctx);
	props.model_names.push("models/crate.mdl".parse().unwrap());
	let mut prop = StaticProp::new(ctx).unwrap();
	prop.set_origin(Vec3::new(64.0, 0.0, 32.0));
	props.props.push(prop);
	let props = props.to_bytes(ctx).unwrap();

	let mut bytes = Vec::new();
	bytes.extend(1_i32.to_le_bytes());
	bytes.extend(GameLumpId::STATIC_PROPS.0.to_le_bytes());
	bytes.extend(0_u16.to_le_bytes());
	bytes.extend(10_u16.to_le_bytes());
	bytes.extend(((offset + 20) as i32).to_le_bytes());
	bytes.extend((props.len() as i32).to_le_bytes());
	bytes.extend(props);
	bytes
}

/// A Source file with a bit of everything. The game lump is the last lump with data, so its offset is known up front.
fn source_file() -> Vec<u8> {
	let mut lumps = vec![
		(LumpKind::Entities, WORLDSPAWN.to_vec()),
		(LumpKind::Planes, plane_bytes(&[(Vec3::X, 1.0), (Vec3::NEG_Z, -4.0)])),
		(LumpKind::Visibility, vec![1, 2, 3, 4, 5, 6, 7]),
		(LumpKind::LeafBrushes, vec![0, 0, 1, 0, 0xFF, 0xFF]),
		(LumpKind::Brushes, [0_i32, 1, 1].iter().flat_map(|v| v.to_le_bytes()).collect()),
	];
	let game_lump_offset = 1036 + lumps.iter().map(|(_, bytes)| bytes.len()).sum::<usize>();
	lumps.push((LumpKind::GameLump, static_prop_lump(game_lump_offset)));
	build(MapType::Source20, lumps)
}

#[test]
fn unmodified_round_trip() {
	let bytes = source_file();
	let mut bsp = parse(&bytes);
	// Decode some, leave the rest as raw bytes.
	bsp.planes().unwrap();
	bsp.entities().unwrap();
	bsp.numbers(LumpKind::LeafBrushes).unwrap();
	assert_eq!(bsp.write().unwrap(), bytes);

	let bsp = parse(&bytes);
	assert_eq!(bsp.write_all_decoded(), bytes);

	// Trailing bytes that don't make up a whole record or number.
	let mut planes = plane_bytes(&[(Vec3::Z, 2.0)]);
	planes.push(0xAB);
	let bytes = build(MapType::Source20, vec![(LumpKind::Planes, planes), (LumpKind::LeafFaces, vec![1, 0, 2])]);
	let mut bsp = parse(&bytes);
	assert_eq!(bsp.planes().unwrap().unwrap().len(), 1);
	assert_eq!(bsp.numbers(LumpKind::LeafFaces).unwrap().unwrap().values, [1]);
	assert_eq!(bsp.write().unwrap(), bytes);
	assert_eq!(bsp.lump_info(LumpKind::Planes).unwrap().unwrap().length, 21);
}

impl Bsp {
	/// Decodes every lump the variant has, then writes.
	fn write_all_decoded(mut self) -> Vec<u8> {
		use strum::IntoEnumIterator;
		for kind in LumpKind::iter() {
			self.lump(kind).unwrap();
		}
		self.game_lump().unwrap().unwrap().static_props().unwrap();
		self.write().unwrap()
	}
}

#[test]
fn edits_survive_writing() {
	let mut bsp = parse(&source_file());
	bsp.entities_mut().unwrap().unwrap().push(Entity::from_pairs([("classname", "light"), ("targetname", "lamp")]));
	bsp.numbers_mut(LumpKind::LeafBrushes).unwrap().unwrap().push(7);
	let props = bsp.game_lump_mut().unwrap().unwrap().static_props_mut().unwrap().unwrap();
	props.props[0].set_skin(3);

	let bsp = parse(&bsp.write().unwrap());
	let entities = bsp.entities().unwrap().unwrap();
	assert_eq!(entities.all_with_name("lamp").count(), 1);
	assert_eq!(bsp.numbers(LumpKind::LeafBrushes).unwrap().unwrap().values, [0, 1, 65535, 7]);
	assert_eq!(bsp.raw_lump(LumpKind::Visibility).unwrap(), Some(&[1, 2, 3, 4, 5, 6, 7][..]));

	let game_lump = bsp.game_lump().unwrap().unwrap();
	assert!(!game_lump.relative_offsets);
	let props = game_lump.static_props().unwrap().unwrap();
	assert_eq!(props.model_name(&props.props[0]), Some("models/crate.mdl"));
	assert_eq!(props.props[0].skin(), Some(3));
	assert_eq!(props.props[0].origin(), Some(Vec3::new(64.0, 0.0, 32.0)));
}

#[test]
fn game_lump_moves_with_earlier_lumps() {
	let mut bsp = parse(&source_file());
	let entities = bsp.entities_mut().unwrap().unwrap();
	entities[0].set("message", "a much longer message than before");

	let bytes = bsp.write().unwrap();
	let bsp = parse(&bytes);
	let info = bsp.lump_info(LumpKind::GameLump).unwrap().unwrap().clone();
	let entry_offset = i32::from_le_bytes(bytes[info.offset as usize + 12..info.offset as usize + 16].try_into().unwrap());
	assert_eq!(entry_offset as u32, info.offset + 20);
	assert_eq!(bsp.game_lump().unwrap().unwrap().entries()[0].version, 10);
}

#[test]
fn external_lump_files() {
	let planes = plane_bytes(&[(Vec3::Y, 12.0)]);
	let mut lump_file = Vec::new();
	for value in [20, 1, 0, planes.len() as i32, 1] {
		lump_file.extend(value.to_le_bytes());
	}
	lump_file.extend(&planes);

	let source = MemoryFileSource::new()
		.with_file("maps/test.bsp", build(MapType::Source20, vec![(LumpKind::Planes, plane_bytes(&[(Vec3::X, 1.0)]))]))
		.with_file("maps/test_l_1.lmp", lump_file);
	let source = Arc::new(source);

	let bsp = Bsp::open(source.clone(), "maps/test.bsp", BspSettings::default()).unwrap();
	assert_eq!(bsp.planes().unwrap().unwrap()[0].dist, 12.0);

	let mut ignoring = Bsp::open(source, "maps/test.bsp", BspSettings { lump_files: false, ..Default::default() }).unwrap();
	assert_eq!(ignoring.planes().unwrap().unwrap()[0].dist, 1.0);

	// Written files hold every lump themselves.
	let mut bsp = bsp;
	let written = parse(&bsp.write().unwrap());
	assert_eq!(written.planes().unwrap().unwrap()[0].dist, 12.0);
	assert!(written.lump_info(LumpKind::Planes).unwrap().unwrap().external_file.is_none());
	assert_eq!(ignoring.write().unwrap().len(), 1036 + 20);
}

#[test]
fn encrypted_round_trip() {
	let mut bytes = build(MapType::Source21, vec![(LumpKind::Entities, WORLDSPAWN.to_vec()), (LumpKind::Planes, plane_bytes(&[(Vec3::Z, 8.0)]))]);
	let key: Vec<u8> = (0..KEY_LEN as u8).map(|i| i.wrapping_mul(37) | 1).collect();
	xor_key_stream(&mut bytes, &key, 0);
	assert_eq!(&bytes[KEY_OFFSET..KEY_OFFSET + KEY_LEN], key.as_slice());

	let mut bsp = parse(&bytes);
	assert_eq!(bsp.map_type(), MapType::TacticalInterventionEncrypted);
	assert_eq!(bsp.entities().unwrap().unwrap()[0].class_name(), "worldspawn");
	assert_eq!(bsp.planes().unwrap().unwrap()[0].dist, 8.0);
	assert_eq!(bsp.write().unwrap(), bytes);
}

#[test]
fn unidentified_files() {
	let err = Bsp::parse(&b"NOPE and nothing else"[..], BspSettings::default()).unwrap_err();
	assert!(matches!(err, BspError::UnidentifiedFormat { magic } if magic == b"NOPE"));

	assert!(Bsp::new(MapType::Quake3).is_ok());
	assert!(Bsp::new(MapType::Source).is_err());
}

#[test]
fn game_lump_entries_are_kept() {
	let mut bsp = Bsp::new(MapType::Source20).unwrap();
	let mut game_lump = GameLump::new(MapType::Source20);
	game_lump.entries_mut().push(GameLumpEntry::new(GameLumpId::DETAIL_PROPS, 4, vec![1, 2, 3, 4]));
	bsp.set_lump(LumpKind::GameLump, LumpData::GameLump(game_lump)).unwrap();

	let bsp = parse(&bsp.write().unwrap());
	let game_lump = bsp.game_lump().unwrap().unwrap();
	assert_eq!(game_lump.entry(GameLumpId::DETAIL_PROPS).unwrap().data, [1, 2, 3, 4]);
	assert!(game_lump.static_props().unwrap().is_none());
}

#[test]
fn broken_game_lump_is_copied() {
	let mut game_lump = Vec::new();
	for value in [1, GameLumpId::STATIC_PROPS.0, 10 << 16, 999_999, 8] {
		game_lump.extend(value.to_le_bytes());
	}
	let bytes = build(MapType::Source20, vec![(LumpKind::Entities, WORLDSPAWN.to_vec()), (LumpKind::GameLump, game_lump)]);

	let mut bsp = parse(&bytes);
	assert_eq!(bsp.write().unwrap(), bytes);
	assert!(bsp.game_lump().is_err());
}
