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

use std::collections::HashMap;
use std::convert::TryInto;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::keydir::{DirEntry, KeyDir};
use crate::record::{self, HEADER_SIZE, TOMBSTONE_FLAG};
use crate::segment::{self, Segment};

// 128 MiB, exposed as a tunable so tests can force rotation without writing
// 128 MiB of filler first.
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 128 << 20;

#[derive(Debug, Clone, Copy)]
pub struct Options {
	pub max_segment_size: u64,
	pub sync_on_rotate: bool,
}

impl Default for Options {
	fn default() -> Options {
		Options { max_segment_size: DEFAULT_MAX_SEGMENT_SIZE, sync_on_rotate: true }
	}
}

pub(crate) struct Inner {
	pub(crate) dir: PathBuf,
	pub(crate) segments: HashMap<u64, Segment>,
	pub(crate) keydir: KeyDir,
	pub(crate) curr_id: u64,
	pub(crate) options: Options,
}

pub struct Engine {
	inner: RwLock<Inner>,
}

impl Engine {
	pub fn open(dir: impl AsRef<Path>) -> Result<Engine> {
		Engine::open_with_options(dir, Options::default())
	}

	pub fn open_with_options(dir: impl AsRef<Path>, options: Options) -> Result<Engine> {
		let dir = dir.as_ref().to_path_buf();
		fs::create_dir_all(&dir).map_err(|e| Error::io_at(&dir, e))?;

		let mut ids = Vec::new();
		for entry in fs::read_dir(&dir).map_err(|e| Error::io_at(&dir, e))? {
			let entry = entry.map_err(|e| Error::io_at(&dir, e))?;
			if let Some(name) = entry.file_name().to_str() {
				if let Some(id) = segment::parse_segment_id(name) {
					ids.push(id);
				}
			}
		}
		ids.sort_unstable();

		let mut segments = HashMap::new();
		let mut keydir = KeyDir::new();
		for &id in &ids {
			let seg = Segment::open(&dir, id)?;
			scan_into(&seg, id, &mut keydir)?;
			segments.insert(id, seg);
		}

		let curr_id = match ids.last() {
			Some(&id) => id,
			None => {
				let seg = Segment::open(&dir, 0)?;
				segments.insert(0, seg);
				0
			}
		};

		log::debug!(target: "caskstore", "opened {} with {} segment(s), {} live key(s), active segment {}", dir.display(), segments.len(), keydir.len(), curr_id);

		Ok(Engine { inner: RwLock::new(Inner { dir, segments, keydir, curr_id, options }) })
	}

	pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
		self.inner.write().put_record(key, value, false)
	}

	// Writes a tombstone even when key is absent, so replicated DEL commands
	// stay idempotent.
	pub fn delete(&self, key: &[u8]) -> Result<()> {
		self.inner.write().put_record(key, &[], true)
	}

	pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
		let inner = self.inner.read();
		let entry = inner.keydir.lookup(key).ok_or(Error::KeyNotFound)?;
		let seg = inner.segments.get(&entry.segment_id).ok_or(Error::MissingSegment(entry.segment_id))?;
		let buf = seg.read_at(entry.offset, entry.size)?;
		let decoded = record::decode(&buf)?;
		if decoded.is_tombstone() {
			return Err(Error::KeyNotFound);
		}
		Ok(decoded.value.to_vec())
	}

	pub fn keys(&self) -> Vec<Vec<u8>> {
		self.inner.read().keydir.keys()
	}

	// Equivalent to Get on every live key, under one shared-lock hold so the
	// result reflects a single consistent directory snapshot.
	pub fn entries(&self) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
		let inner = self.inner.read();
		let mut out = HashMap::with_capacity(inner.keydir.len());
		for (key, entry) in inner.keydir.iter() {
			let seg = inner.segments.get(&entry.segment_id).ok_or(Error::MissingSegment(entry.segment_id))?;
			let buf = seg.read_at(entry.offset, entry.size)?;
			let decoded = record::decode(&buf)?;
			if !decoded.is_tombstone() {
				out.insert(key.clone(), decoded.value.to_vec());
			}
		}
		Ok(out)
	}

	pub fn apply_command(&self, op: &str, key: &[u8], value: &[u8]) -> Result<()> {
		match op {
			"PUT" => self.put(key, value),
			"DEL" => self.delete(key),
			other => Err(Error::UnknownOperation(other.to_string())),
		}
	}

	// Closes every open segment, clears the directory, truncates data-0.db,
	// and reinserts every pair via put_record, all under one held write
	// guard so the swap is atomic: no reader can observe the store with the
	// old keys cleared and the new keys not yet inserted.
	pub fn restore_from_snapshot(&self, data: HashMap<Vec<u8>, Vec<u8>>) -> Result<()> {
		let mut inner = self.inner.write();
		for (_, seg) in inner.segments.drain() {
			let _ = seg.close();
		}
		inner.keydir.clear();
		let seg = Segment::create_truncated(&inner.dir, 0)?;
		inner.segments.insert(0, seg);
		inner.curr_id = 0;
		for (key, value) in data {
			inner.put_record(&key, &value, false)?;
		}
		Ok(())
	}

	pub fn close(&self) -> Result<()> {
		let mut inner = self.inner.write();
		let ids: Vec<u64> = inner.segments.keys().copied().collect();
		for id in ids {
			if let Some(seg) = inner.segments.remove(&id) {
				seg.close()?;
			}
		}
		log::debug!(target: "caskstore", "closed {}", inner.dir.display());
		Ok(())
	}

	// See the compaction module for the step-by-step algorithm and its
	// failure policy. Held under the exclusive lock for the whole operation.
	pub fn initiate_compaction(&self) -> Result<()> {
		let mut inner = self.inner.write();
		crate::compaction::initiate_compaction(&mut inner)
	}
}

impl Inner {
	pub(crate) fn active_segment_mut(&mut self) -> Result<&mut Segment> {
		self.segments.get_mut(&self.curr_id).ok_or(Error::MissingSegment(self.curr_id))
	}

	// The normal Put/Delete path: rotate, encode, append, update the
	// directory. Shared by Engine::put, Engine::delete, and
	// restore_from_snapshot so all three run under one held write guard.
	pub(crate) fn put_record(&mut self, key: &[u8], value: &[u8], tombstone: bool) -> Result<()> {
		self.rotate_if_needed()?;
		let buf = record::encode(key, value, tombstone);
		let curr_id = self.curr_id;
		let seg = self.active_segment_mut()?;
		let offset = seg.append(&buf)?;
		if tombstone {
			self.keydir.remove(key);
		} else {
			self.keydir.insert(key.to_vec(), DirEntry { segment_id: curr_id, offset, size: buf.len() as u64 });
		}
		Ok(())
	}

	// Checked before every append: the threshold is a pre-check, so a single
	// record may still push a segment past it.
	pub(crate) fn rotate_if_needed(&mut self) -> Result<()> {
		let active_offset = self.active_segment_mut()?.offset();
		if active_offset < self.options.max_segment_size {
			return Ok(());
		}
		let old = self.segments.remove(&self.curr_id).ok_or(Error::MissingSegment(self.curr_id))?;
		if self.options.sync_on_rotate {
			old.sync()?;
		}
		old.close()?;
		self.curr_id += 1;
		let seg = Segment::open(&self.dir, self.curr_id)?;
		log::info!(target: "caskstore", "rotated to segment {} in {}", self.curr_id, self.dir.display());
		self.segments.insert(self.curr_id, seg);
		Ok(())
	}
}

// Stops silently on a short read anywhere in a record, treating clean EOF
// and a torn tail from an interrupted append the same way. A non-empty
// short read is logged so the silence is at least observable.
pub(crate) fn scan_into(seg: &Segment, id: u64, keydir: &mut KeyDir) -> Result<()> {
	let len = seg.offset();
	let mut offset = 0u64;
	loop {
		if offset >= len {
			break;
		}
		let remaining = len - offset;
		if remaining < HEADER_SIZE as u64 {
			log::warn!(target: "caskstore", "segment {} has a {} byte short read at offset {}, treating as a torn tail", id, remaining, offset);
			break;
		}
		let header = seg.read_at(offset, HEADER_SIZE as u64)?;
		let flags = header[0];
		let key_len = u64::from_be_bytes(header[1..9].try_into().unwrap());
		let value_len = u64::from_be_bytes(header[9..17].try_into().unwrap());
		let record_len = match (HEADER_SIZE as u64).checked_add(key_len).and_then(|n| n.checked_add(value_len)) {
			Some(n) => n,
			None => {
				log::warn!(target: "caskstore", "segment {} has an overflowing record length at offset {}, stopping scan", id, offset);
				break;
			}
		};
		if offset + record_len > len {
			log::warn!(target: "caskstore", "segment {} has a record at offset {} truncated by the tail, stopping scan", id, offset);
			break;
		}
		let key = seg.read_at(offset + HEADER_SIZE as u64, key_len)?;
		if flags & TOMBSTONE_FLAG == TOMBSTONE_FLAG {
			keydir.remove(&key);
		} else {
			keydir.insert(key, DirEntry { segment_id: id, offset, size: record_len });
		}
		offset += record_len;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn opts(max_segment_size: u64) -> Options {
		Options { max_segment_size, sync_on_rotate: true }
	}

	#[test]
	fn put_then_get_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open(dir.path()).unwrap();
		engine.put(b"foo", b"bar").unwrap();
		engine.put(b"hello", b"world").unwrap();
		assert_eq!(engine.get(b"foo").unwrap(), b"bar");
		assert_eq!(engine.get(b"hello").unwrap(), b"world");
		assert_eq!(engine.keys(), vec![b"foo".to_vec(), b"hello".to_vec()]);
	}

	#[test]
	fn delete_then_get_is_key_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open(dir.path()).unwrap();
		engine.put(b"k", b"v1").unwrap();
		engine.put(b"k", b"v2").unwrap();
		engine.delete(b"k").unwrap();
		assert!(matches!(engine.get(b"k"), Err(Error::KeyNotFound)));
		assert!(engine.keys().is_empty());
	}

	#[test]
	fn delete_of_absent_key_still_writes_a_tombstone_and_is_not_an_error() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open(dir.path()).unwrap();
		engine.delete(b"never-inserted").unwrap();
		assert!(engine.keys().is_empty());
	}

	#[test]
	fn reopen_recovers_state() {
		let dir = tempfile::tempdir().unwrap();
		{
			let engine = Engine::open(dir.path()).unwrap();
			engine.put(b"foo", b"bar").unwrap();
			engine.put(b"hello", b"world").unwrap();
			engine.close().unwrap();
		}
		let engine = Engine::open(dir.path()).unwrap();
		assert_eq!(engine.keys(), vec![b"foo".to_vec(), b"hello".to_vec()]);
		assert_eq!(engine.get(b"foo").unwrap(), b"bar");
		assert_eq!(engine.get(b"hello").unwrap(), b"world");
	}

	#[test]
	fn reopen_after_delete() {
		let dir = tempfile::tempdir().unwrap();
		{
			let engine = Engine::open(dir.path()).unwrap();
			engine.put(b"k", b"v1").unwrap();
			engine.put(b"k", b"v2").unwrap();
			engine.delete(b"k").unwrap();
			engine.close().unwrap();
		}
		let engine = Engine::open(dir.path()).unwrap();
		assert!(matches!(engine.get(b"k"), Err(Error::KeyNotFound)));
		assert!(engine.keys().is_empty());
	}

	#[test]
	fn rotation_creates_a_new_active_segment() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open_with_options(dir.path(), opts(64)).unwrap();
		for i in 0..20 {
			engine.put(format!("k{}", i).as_bytes(), &vec![0u8; 16]).unwrap();
		}
		let data_files: Vec<_> = fs::read_dir(dir.path())
			.unwrap()
			.filter_map(|e| e.ok())
			.filter(|e| segment::parse_segment_id(e.file_name().to_str().unwrap()).is_some())
			.collect();
		assert!(data_files.len() >= 2);
	}

	#[test]
	fn overwrite_replaces_directory_entry() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open(dir.path()).unwrap();
		engine.put(b"a", b"1").unwrap();
		engine.put(b"a", b"1b").unwrap();
		assert_eq!(engine.get(b"a").unwrap(), b"1b");
	}

	#[test]
	fn entries_matches_get_over_keys() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open(dir.path()).unwrap();
		engine.put(b"a", b"1").unwrap();
		engine.put(b"b", b"2").unwrap();
		engine.delete(b"b").unwrap();
		let entries = engine.entries().unwrap();
		let expected: HashMap<Vec<u8>, Vec<u8>> =
			engine.keys().into_iter().map(|k| { let v = engine.get(&k).unwrap(); (k, v) }).collect();
		assert_eq!(entries, expected);
	}

	#[test]
	fn restore_from_snapshot_replaces_all_state() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open(dir.path()).unwrap();
		engine.put(b"old", b"gone").unwrap();
		let mut snapshot = HashMap::new();
		snapshot.insert(b"x".to_vec(), b"X".to_vec());
		snapshot.insert(b"y".to_vec(), b"Y".to_vec());
		engine.restore_from_snapshot(snapshot).unwrap();
		assert_eq!(engine.keys(), vec![b"x".to_vec(), b"y".to_vec()]);
		assert_eq!(engine.get(b"x").unwrap(), b"X");
		assert_eq!(engine.get(b"y").unwrap(), b"Y");
		assert!(matches!(engine.get(b"old"), Err(Error::KeyNotFound)));
	}

	#[test]
	fn restore_from_snapshot_is_one_atomic_critical_section() {
		use std::sync::atomic::{AtomicBool, Ordering};
		use std::sync::Arc;
		use std::thread;

		let dir = tempfile::tempdir().unwrap();
		let engine = Arc::new(Engine::open(dir.path()).unwrap());
		for i in 0..500 {
			engine.put(format!("old{}", i).as_bytes(), b"gone").unwrap();
		}

		let stop = Arc::new(AtomicBool::new(false));
		let observer = {
			let engine = Arc::clone(&engine);
			let stop = Arc::clone(&stop);
			thread::spawn(move || {
				while !stop.load(Ordering::Relaxed) {
					let keys = engine.keys();
					// A reader can only ever see the full pre-restore set or the
					// full post-restore set, never a store cleared but not yet
					// refilled (that gap is what a dropped lock would expose).
					assert_eq!(keys.len(), 500);
					let all_old = keys.iter().all(|k| k.starts_with(b"old"));
					let all_new = keys.iter().all(|k| k.starts_with(b"new"));
					assert!(all_old || all_new, "saw a mixed pre/post-restore key set: {:?}", keys);
				}
			})
		};

		let mut snapshot = HashMap::new();
		for i in 0..500 {
			snapshot.insert(format!("new{}", i).into_bytes(), b"here".to_vec());
		}
		engine.restore_from_snapshot(snapshot).unwrap();
		stop.store(true, Ordering::Relaxed);
		observer.join().unwrap();

		assert_eq!(engine.keys().len(), 500);
		assert!(matches!(engine.get(b"old0"), Err(Error::KeyNotFound)));
		assert_eq!(engine.get(b"new0").unwrap(), b"here");
	}

	#[test]
	fn apply_command_dispatches_put_and_del() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open(dir.path()).unwrap();
		engine.apply_command("PUT", b"k", b"v").unwrap();
		assert_eq!(engine.get(b"k").unwrap(), b"v");
		engine.apply_command("DEL", b"k", b"").unwrap();
		assert!(matches!(engine.get(b"k"), Err(Error::KeyNotFound)));
	}

	#[test]
	fn apply_command_rejects_unknown_op() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open(dir.path()).unwrap();
		assert!(matches!(engine.apply_command("XYZ", b"k", b"v"), Err(Error::UnknownOperation(_))));
	}

	#[test]
	fn recovers_past_a_truncated_tail() {
		let dir = tempfile::tempdir().unwrap();
		{
			let engine = Engine::open(dir.path()).unwrap();
			engine.put(b"a", b"1").unwrap();
			engine.put(b"b", b"2").unwrap();
			engine.close().unwrap();
		}
		// Simulate an interrupted append: truncate data-0.db mid-record.
		let path = segment::segment_path(dir.path(), 0);
		let full_len = fs::metadata(&path).unwrap().len();
		let f = fs::OpenOptions::new().write(true).open(&path).unwrap();
		f.set_len(full_len - 3).unwrap();
		drop(f);

		let engine = Engine::open(dir.path()).unwrap();
		assert_eq!(engine.keys(), vec![b"a".to_vec()]);
		assert_eq!(engine.get(b"a").unwrap(), b"1");
		assert!(matches!(engine.get(b"b"), Err(Error::KeyNotFound)));
	}

	#[test]
	fn empty_key_and_value_boundary_cases() {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open(dir.path()).unwrap();
		engine.put(b"", b"value-for-empty-key").unwrap();
		engine.put(b"key-for-empty-value", b"").unwrap();
		engine.put(b"", b"").unwrap();
		assert_eq!(engine.get(b"").unwrap(), b"");
		assert_eq!(engine.get(b"key-for-empty-value").unwrap(), b"");
	}

	#[test]
	fn concurrent_puts_and_gets_see_no_corruption() {
		use std::sync::Arc;
		use std::thread;

		let dir = tempfile::tempdir().unwrap();
		let engine = Arc::new(Engine::open(dir.path()).unwrap());

		let mut writers = Vec::new();
		for t in 0..10 {
			let engine = Arc::clone(&engine);
			writers.push(thread::spawn(move || {
				for i in 0..10 {
					let key = format!("t{}-k{}", t, i);
					engine.put(key.as_bytes(), key.as_bytes()).unwrap();
				}
			}));
		}
		for w in writers {
			w.join().unwrap();
		}

		let mut readers = Vec::new();
		for _ in 0..10 {
			let engine = Arc::clone(&engine);
			readers.push(thread::spawn(move || {
				for key in engine.keys() {
					let value = engine.get(&key).unwrap();
					assert_eq!(value, key);
				}
			}));
		}
		for r in readers {
			r.join().unwrap();
		}

		assert_eq!(engine.keys().len(), 100);
	}
}
