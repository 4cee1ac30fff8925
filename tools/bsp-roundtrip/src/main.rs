use anybsp::prelude::*;
use std::{env, fs, path::Path, sync::Arc};

fn main() {
	env_logger::init();

	let mut args = env::args().skip(1);
	let path = args.next().expect("Usage: bsp-roundtrip <map.bsp> [output.bsp] [--decode]");
	let mut output = None;
	let mut decode = false;
	for arg in args {
		match arg.as_str() {
			"--decode" => decode = true,
			_ => output = Some(arg),
		}
	}

	let path = Path::new(&path);
	let dir = path.parent().unwrap_or(Path::new("."));
	let file_name = path.file_name().and_then(|name| name.to_str()).expect("Map path has no file name");

	let mut bsp = Bsp::open(Arc::new(DirectoryFileSource::new(dir)), file_name, BspSettings::default()).unwrap();
	let map_type = bsp.map_type();
	log::info!("{file_name} is a {map_type} map (revision {})", bsp.header().revision());

	for index in 0..map_type.num_lumps() {
		let info = bsp.lump_info_at(index).unwrap();
		if info.is_empty() {
			continue;
		}
		let name = LumpKind::for_index(index, map_type).map_or("unknown", Into::into);
		log::info!("  {index:>3} {name:<24} offset {:>10} length {:>10} version {}", info.offset, info.length, info.version);
	}

	if decode {
		for index in 0..map_type.num_lumps() {
			let Some(kind) = LumpKind::for_index(index, map_type) else { continue };
			match bsp.lump(kind) {
				Ok(Some(data)) => log::info!("Decoded {kind}: {} elements", data.count()),
				Ok(None) => {}
				Err(err) => log::warn!("Could not decode {kind}: {err}"),
			}
		}
	}

	let bytes = bsp.write().unwrap();
	match output {
		Some(output) => {
			fs::write(&output, &bytes).expect("Failed to write output file");
			log::info!("Wrote {} bytes to {output}", bytes.len());
		}
		None => log::info!("Encoded {} bytes", bytes.len()),
	}
}
