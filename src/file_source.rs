//! Where BSP bytes come from. A [`Bsp`](crate::bsp::Bsp) never touches the file system itself, it asks a [`FileSource`] for paths.

use std::{fs, path::PathBuf};

use regex::Regex;

use crate::prelude::*;

/// Resolves path strings to file contents.
///
/// Implementations decide how paths are looked up (case sensitivity, search roots, fetching), the lump engine only ever asks these three
/// questions and never caches the answers itself.
pub trait FileSource {
	fn exists(&self, path: &str) -> bool;

	/// The full contents of the file at `path`, or `None` if it can't be found.
	fn get_bytes(&self, path: &str) -> Option<Arc<[u8]>>;

	/// Every known path starting with `prefix`. If `pattern` is supplied, only paths it matches are returned.
	fn find_paths(&self, prefix: &str, pattern: Option<&Regex>) -> Vec<String>;
}

/// Case-insensitive in-memory files, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSource {
	files: HashMap<String, (String, Arc<[u8]>)>,
}

impl MemoryFileSource {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds or replaces a file. Returns `self` for chaining.
	pub fn with_file(mut self, path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
		self.insert(path, bytes);
		self
	}

	pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
		let path = path.into();
		self.files.insert(normalize(&path), (path, bytes.into()));
	}

	pub fn remove(&mut self, path: &str) -> Option<Arc<[u8]>> {
		self.files.remove(&normalize(path)).map(|(_, bytes)| bytes)
	}
}

impl FileSource for MemoryFileSource {
	fn exists(&self, path: &str) -> bool {
		self.files.contains_key(&normalize(path))
	}

	fn get_bytes(&self, path: &str) -> Option<Arc<[u8]>> {
		self.files.get(&normalize(path)).map(|(_, bytes)| bytes.clone())
	}

	fn find_paths(&self, prefix: &str, pattern: Option<&Regex>) -> Vec<String> {
		let prefix = normalize(prefix);
		let mut paths: Vec<String> = self
			.files
			.iter()
			.filter(|(key, _)| key.starts_with(&prefix))
			.filter(|(key, _)| pattern.is_none_or(|pattern| pattern.is_match(key)))
			.map(|(_, (path, _))| path.clone())
			.collect();
		paths.sort();
		paths
	}
}

/// Files on disk, with paths relative to a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryFileSource {
	root: PathBuf,
}

impl DirectoryFileSource {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}
}

impl FileSource for DirectoryFileSource {
	fn exists(&self, path: &str) -> bool {
		self.root.join(path).is_file()
	}

	fn get_bytes(&self, path: &str) -> Option<Arc<[u8]>> {
		match fs::read(self.root.join(path)) {
			Ok(bytes) => Some(bytes.into()),
			Err(err) => {
				log::debug!("Failed to read {path}: {err}");
				None
			}
		}
	}

	fn find_paths(&self, prefix: &str, pattern: Option<&Regex>) -> Vec<String> {
		let prefix = prefix.replace('\\', "/");
		let (dir, _) = prefix.rsplit_once('/').unwrap_or(("", prefix.as_str()));

		let Ok(entries) = fs::read_dir(self.root.join(dir)) else {
			return Vec::new();
		};

		let mut paths: Vec<String> = entries
			.flatten()
			.filter_map(|entry| {
				let name = entry.file_name().into_string().ok()?;
				Some(if dir.is_empty() { name } else { format!("{dir}/{name}") })
			})
			.filter(|path| path.to_lowercase().starts_with(&prefix.to_lowercase()))
			.filter(|path| pattern.is_none_or(|pattern| pattern.is_match(&path.to_lowercase())))
			.collect();
		paths.sort();
		paths
	}
}

fn normalize(path: &str) -> String {
	path.replace('\\', "/").to_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn memory_lookup_is_case_insensitive() {
		let source = MemoryFileSource::new().with_file("Maps/Test.BSP", vec![1u8, 2, 3]);

		assert!(source.exists("maps/test.bsp"));
		assert!(source.exists("MAPS\\TEST.bsp"));
		assert_eq!(source.get_bytes("maps/TEST.bsp").as_deref(), Some(&[1, 2, 3][..]));
		assert!(source.get_bytes("maps/other.bsp").is_none());
	}

	#[test]
	fn memory_find_paths() {
		let source = MemoryFileSource::new()
			.with_file("maps/test.bsp", Vec::<u8>::new())
			.with_file("maps/test_l_1.lmp", Vec::<u8>::new())
			.with_file("maps/test_l_0.lmp", Vec::<u8>::new())
			.with_file("maps/test.nav", Vec::<u8>::new());

		let pattern = Regex::new(r"_._.*\.lmp$").unwrap();
		assert_eq!(source.find_paths("maps/test", Some(&pattern)), ["maps/test_l_0.lmp", "maps/test_l_1.lmp"]);
		assert_eq!(source.find_paths("maps/test", None).len(), 4);
	}
}
