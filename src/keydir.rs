// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Parity.

// Parity is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity.  If not, see <http://www.gnu.org/licenses/>.

// Never persisted; rebuilt from scratch on every Engine::open.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
	pub segment_id: u64,
	pub offset: u64,
	pub size: u64,
}

#[derive(Default)]
pub struct KeyDir {
	entries: HashMap<Vec<u8>, DirEntry>,
}

impl KeyDir {
	pub fn new() -> KeyDir {
		KeyDir { entries: HashMap::new() }
	}

	pub fn lookup(&self, key: &[u8]) -> Option<DirEntry> {
		self.entries.get(key).copied()
	}

	pub fn insert(&mut self, key: Vec<u8>, entry: DirEntry) {
		self.entries.insert(key, entry);
	}

	pub fn remove(&mut self, key: &[u8]) {
		self.entries.remove(key);
	}

	pub fn clear(&mut self) {
		self.entries.clear();
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	// Sorted ascending lexicographic order.
	pub fn keys(&self) -> Vec<Vec<u8>> {
		let mut keys: Vec<Vec<u8>> = self.entries.keys().cloned().collect();
		keys.sort();
		keys
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &DirEntry)> {
		self.entries.iter()
	}

	pub fn replace(&mut self, entries: HashMap<Vec<u8>, DirEntry>) {
		self.entries = entries;
	}
}
