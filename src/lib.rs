//! Reading, editing and writing BSP files of the id Tech, GoldSrc, Source, Call of Duty and Titanfall families.
//!
//! The entry point is [`Bsp`](bsp::Bsp), which identifies the on-disk variant of a file, decodes lumps lazily as they are requested,
//! and writes a consistent file back out with [`Bsp::write`](bsp::Bsp::write).

extern crate self as anybsp;

pub mod prelude;
pub(crate) use prelude::*;

pub mod bsp;
pub mod data;
pub mod file_source;
pub mod header;
pub mod layout;
pub mod lump;
pub mod map_type;
pub mod raw;
pub mod reader;
pub mod sniff;
pub mod util;
pub mod writer;

#[cfg(test)]
mod loading_tests;

// Re-exports
pub use glam;
pub use regex;
pub use smallvec;

#[derive(Debug, Clone, Error)]
pub enum BspError {
	#[error("Tried to read bytes from {from} to {to} from buffer of size {size}")]
	BufferOutOfBounds { from: usize, to: usize, size: usize },
	#[error("Lump ({info:?}) out of bounds of data of size {size}! Malformed/corrupted BSP?")]
	LumpOutOfBounds { info: LumpInfo, size: usize },
	#[error("Failed to parse string at index {index}, invalid utf-8 sequence: {sequence:?}")]
	InvalidString { index: usize, sequence: Vec<u8> },
	#[error("Could not identify BSP variant, magic number \"{}\"", display_magic_number(magic))]
	UnidentifiedFormat { magic: Vec<u8> },
	#[error("{what} does not exist in map type {map_type} (lump version {version})")]
	UnsupportedMapType {
		what: &'static str,
		map_type: MapType,
		version: i32,
	},
	#[error("{0} records are of variable length, and must be decoded by their containing lump")]
	VariableLengthLump(&'static str),
	#[error("Lump index {index} out of range, map type {map_type} has {num_lumps} lumps")]
	LumpIndexOutOfRange { index: usize, num_lumps: usize, map_type: MapType },
	#[error("Brace mismatch at byte {offset} after {entities} entities, depth {depth}")]
	EntityBraceMismatch { entities: usize, depth: i32, offset: usize },
	#[error("File \"{0}\" not found")]
	FileNotFound(String),
	#[error("Index {index} out of bounds of {lump} lump with {len} elements")]
	IndexOutOfBounds { lump: &'static str, index: i64, len: usize },

	/// For telling the user exactly where the error occurred in the process.
	#[error("{0} - {1}")]
	DoingJob(String, Box<BspError>),
}

impl BspError {
	/// The error behind any [`BspError::DoingJob`].
	pub fn root(&self) -> &BspError {
		let mut err = self;
		loop {
			match err {
				Self::DoingJob(_, child) => err = child.as_ref(),
				_ => return err,
			}
		}
	}

	#[inline]
	pub fn map_utf8_error(data: &[u8]) -> impl FnOnce(std::str::Utf8Error) -> Self + '_ {
		|err| BspError::InvalidString {
			index: err.valid_up_to(),
			sequence: data[err.valid_up_to()..err.valid_up_to() + err.error_len().unwrap_or(1)].to_vec(),
		}
	}
}

pub type BspResult<T> = Result<T, BspError>;

/// Anything that can describe what was being done when an error occurred. Closures are only called if there was an error.
pub trait JobDescription {
	fn describe(self) -> String;
}

impl JobDescription for &str {
	fn describe(self) -> String {
		self.to_owned()
	}
}

impl JobDescription for String {
	fn describe(self) -> String {
		self
	}
}

impl<F: FnOnce() -> String> JobDescription for F {
	fn describe(self) -> String {
		self()
	}
}

pub trait BspResultDoingJobExt {
	/// Like `map_err`, but specifically for adding messages to BSP errors to tell the user exactly what was going on when the error occurred.
	fn job(self, job: impl JobDescription) -> Self;
}

impl<T> BspResultDoingJobExt for BspResult<T> {
	#[inline]
	fn job(self, job: impl JobDescription) -> Self {
		match self {
			Ok(v) => Ok(v),
			Err(err) => Err(BspError::DoingJob(job.describe(), Box::new(err))),
		}
	}
}

#[cfg(test)]
mod error_tests {
	use super::*;

	#[test]
	fn root_unwraps_jobs() {
		let result: BspResult<()> = Err(BspError::FileNotFound("maps/a.bsp".into()));
		let err = result.job("Opening map").job(|| format!("Loading {}", 1)).unwrap_err();

		assert!(matches!(err.root(), BspError::FileNotFound(_)));
		assert_eq!(err.to_string(), "Loading 1 - Opening map - File \"maps/a.bsp\" not found");
	}
}
