//! The entity text lump.

use std::fmt;

use derive_more::{Deref, DerefMut, IntoIterator};

use crate::prelude::*;

/// One entity: an ordered list of key/value pairs. Keys may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entity {
	pub pairs: Vec<(String, String)>,
}

impl Entity {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
		Self {
			pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
		}
	}

	/// The value of the first pair with `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	/// Replaces the value of the first pair with `key`, or appends a new pair.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		let key = key.into();
		let value = value.into();
		match self.pairs.iter_mut().find(|(k, _)| *k == key) {
			Some((_, v)) => *v = value,
			None => self.pairs.push((key, value)),
		}
	}

	/// Removes every pair with `key`. Returns whether there were any.
	pub fn remove(&mut self, key: &str) -> bool {
		let len = self.pairs.len();
		self.pairs.retain(|(k, _)| k != key);
		self.pairs.len() != len
	}

	/// `classname`, empty if not set.
	#[inline]
	pub fn class_name(&self) -> &str {
		self.get("classname").unwrap_or_default()
	}

	/// `targetname`, empty if not set.
	#[inline]
	pub fn name(&self) -> &str {
		self.get("targetname").unwrap_or_default()
	}

	/// Reads the key/value pairs out of the text of one entity block.
	fn parse_block(text: &str) -> Self {
		let chars: Vec<char> = text.chars().collect();
		let mut tokens = Vec::new();
		let mut current: Option<String> = None;

		for (i, &c) in chars.iter().enumerate() {
			if c != '"' {
				if let Some(current) = &mut current {
					current.push(c);
				}
				continue;
			}
			match current.take() {
				None => current = Some(String::new()),
				Some(mut token) => {
					let escaped = i > 0 && chars[i - 1] == '\\';
					let line_end = chars.get(i + 1).is_none_or(|next| matches!(next, '\n' | '\r'));
					if escaped && !line_end {
						token.push(c);
						current = Some(token);
					} else {
						tokens.push(token);
					}
				}
			}
		}

		if tokens.len() % 2 != 0 {
			log::warn!("Entity has an odd number of tokens, dropping \"{}\"", tokens.last().map_or("", String::as_str));
			tokens.pop();
		}

		let mut pairs = Vec::with_capacity(tokens.len() / 2);
		let mut tokens = tokens.into_iter();
		while let (Some(key), Some(value)) = (tokens.next(), tokens.next()) {
			pairs.push((key, value));
		}
		Self { pairs }
	}
}

impl fmt::Display for Entity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{{")?;
		for (key, value) in &self.pairs {
			writeln!(f, "\"{key}\" \"{value}\"")?;
		}
		writeln!(f, "}}")
	}
}

/// The entity lump. Text that isn't UTF-8 is read as Latin-1, and written back the same way.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deref, DerefMut, IntoIterator)]
#[cfg_attr(feature = "bevy_reflect", derive(Reflect))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entities {
	#[deref]
	#[deref_mut]
	#[into_iterator(owned, ref, ref_mut)]
	pub entities: Vec<Entity>,
	pub latin1: bool,
}

/// Bytes a brace has to follow to count as an entity delimiter. Unquoted texture paths sometimes contain braces.
fn is_brace_predecessor(byte: Option<u8>) -> bool {
	matches!(byte, None | Some(b' ' | b'\t' | b'\n' | b'\r' | b'"'))
}

impl Entities {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn parse(data: &[u8]) -> BspResult<Self> {
		let mut in_quotes = false;
		let mut depth: i32 = 0;
		let mut block_start = 0;
		let mut blocks = Vec::new();

		for (offset, &byte) in data.iter().enumerate() {
			let previous = offset.checked_sub(1).map(|i| data[i]);
			match byte {
				b'"' => {
					if in_quotes && data.get(offset + 1).is_none_or(|next| matches!(next, b'\n' | b'\r')) {
						in_quotes = false;
					} else if previous != Some(b'\\') {
						in_quotes = !in_quotes;
					}
				}
				b'{' if !in_quotes && is_brace_predecessor(previous) => {
					if depth == 0 {
						block_start = offset;
					}
					depth += 1;
				}
				b'}' if !in_quotes && is_brace_predecessor(previous) => {
					depth -= 1;
					if depth == 0 {
						blocks.push(block_start..offset + 1);
					} else if depth < 0 {
						return Err(BspError::EntityBraceMismatch {
							entities: blocks.len(),
							depth,
							offset,
						});
					}
				}
				_ => {}
			}
		}

		if depth != 0 {
			return Err(BspError::EntityBraceMismatch {
				entities: blocks.len(),
				depth,
				offset: data.len(),
			});
		}

		let latin1 = std::str::from_utf8(data).is_err();
		if latin1 {
			log::debug!("Entity lump isn't UTF-8, reading it as Latin-1");
		}

		let entities = blocks
			.into_iter()
			.map(|range| {
				let block = &data[range];
				if latin1 {
					Entity::parse_block(&block.iter().map(|&b| b as char).collect::<String>())
				} else {
					Entity::parse_block(&String::from_utf8_lossy(block))
				}
			})
			.collect();

		Ok(Self { entities, latin1 })
	}

	/// Every entity followed by a newline, then a null terminator.
	pub fn to_bytes(&self) -> Vec<u8> {
		if self.entities.is_empty() {
			return vec![0];
		}

		let mut text = String::new();
		for entity in &self.entities {
			text.push_str(&entity.to_string());
		}

		let mut bytes: Vec<u8> = if self.latin1 {
			text.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect()
		} else {
			text.into_bytes()
		};
		bytes.push(0);
		bytes
	}

	pub fn all_of_type<'a>(&'a self, class_name: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
		self.entities.iter().filter(move |entity| entity.class_name().eq_ignore_ascii_case(class_name))
	}

	pub fn all_with_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
		self.entities.iter().filter(move |entity| entity.name().eq_ignore_ascii_case(name))
	}

	pub fn all_with_attribute<'a>(&'a self, key: &'a str, value: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
		self.entities
			.iter()
			.filter(move |entity| entity.get(key).is_some_and(|v| v.eq_ignore_ascii_case(value)))
	}

	/// Returns how many were removed.
	pub fn remove_all_of_type(&mut self, class_name: &str) -> usize {
		let len = self.entities.len();
		self.entities.retain(|entity| !entity.class_name().eq_ignore_ascii_case(class_name));
		len - self.entities.len()
	}

	/// Returns how many were removed.
	pub fn remove_all_with_attribute(&mut self, key: &str, value: &str) -> usize {
		let len = self.entities.len();
		self.entities.retain(|entity| !entity.get(key).is_some_and(|v| v.eq_ignore_ascii_case(value)));
		len - self.entities.len()
	}
}
