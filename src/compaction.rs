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

// Failure policy: any I/O error before the old segments are deleted aborts
// with no observable change to the live directory, though the engine may be
// left with some segment files closed and must be reopened by the caller.
// Failures after old segments are deleted are catastrophic and are an
// accepted limitation of this design, not handled here.

use std::collections::HashMap;
use std::fs;

use crate::engine::Inner;
use crate::error::{Error, Result};
use crate::keydir::DirEntry;
use crate::record;
use crate::segment::{self, Segment};

const COMPACT_TMP_DIR: &str = "compact-tmp";
const COMPACT_FILE_PREFIX: &str = "data-compact-";
const COMPACT_FILE_SUFFIX: &str = ".db";

pub(crate) fn initiate_compaction(inner: &mut Inner) -> Result<()> {
	log::info!(target: "caskstore", "compaction initiated in {}", inner.dir.display());

	// Step 1: flush and sync the active segment.
	{
		let active = inner.active_segment_mut()?;
		active.flush()?;
		active.sync()?;
	}

	// Step 2: ensure every segment referenced by the directory is open and
	// seekable; reopen it if stale. All segments referenced by the
	// directory are, by construction, already present in `inner.segments`
	// (the engine never drops a segment that the directory still points
	// into), so this just defends against a handle gone bad underneath us.
	for seg in inner.segments.values_mut() {
		if seg.reopen_for_read().is_err() {
			log::warn!(target: "caskstore", "segment {} failed to reopen during compaction", seg.id);
		}
	}

	// Step 3: materialize the live (key, value) set entirely in memory.
	let live = live_entries(inner)?;
	log::debug!(target: "caskstore", "compaction collected {} live key(s)", live.len());

	// Step 4: close all current segment files.
	let old_ids: Vec<u64> = inner.segments.keys().copied().collect();
	for id in &old_ids {
		if let Some(seg) = inner.segments.remove(id) {
			seg.close()?;
		}
	}

	// Step 5: create a sibling temporary directory.
	let tmp_dir = inner.dir.join(COMPACT_TMP_DIR);
	if tmp_dir.exists() {
		fs::remove_dir_all(&tmp_dir).map_err(|e| Error::io_at(&tmp_dir, e))?;
	}
	fs::create_dir(&tmp_dir).map_err(|e| Error::io_at(&tmp_dir, e))?;

	// Step 6: write new segments into the temp directory, applying the same
	// rotation rule as normal writes.
	let mut new_keydir: HashMap<Vec<u8>, DirEntry> = HashMap::with_capacity(live.len());
	let mut compact_id: u64 = 0;
	let mut writer = open_compact_segment(&tmp_dir, compact_id)?;
	for (key, value) in live {
		let buf = record::encode(&key, &value, false);
		if writer.offset() >= inner.options.max_segment_size {
			finish_compact_segment(writer)?;
			compact_id += 1;
			writer = open_compact_segment(&tmp_dir, compact_id)?;
		}
		let offset = writer.append(&buf)?;
		new_keydir.insert(key, DirEntry { segment_id: compact_id, offset, size: buf.len() as u64 });
	}

	// Step 7: flush, sync, and close the last temporary segment.
	finish_compact_segment(writer)?;

	// Step 8: delete every file matching data-*.db in the real directory.
	for entry in fs::read_dir(&inner.dir).map_err(|e| Error::io_at(&inner.dir, e))? {
		let entry = entry.map_err(|e| Error::io_at(&inner.dir, e))?;
		if let Some(name) = entry.file_name().to_str() {
			if segment::parse_segment_id(name).is_some() {
				fs::remove_file(entry.path()).map_err(|e| Error::io_at(entry.path(), e))?;
			}
		}
	}

	// Step 9: rename compacted files into place, ascending by id.
	for id in 0..=compact_id {
		let from = compact_path(&tmp_dir, id);
		let to = segment::segment_path(&inner.dir, id);
		fs::rename(&from, &to).map_err(|e| Error::io_at(&to, e))?;
	}

	// Step 10: remove the temp directory.
	fs::remove_dir_all(&tmp_dir).map_err(|e| Error::io_at(&tmp_dir, e))?;

	// Step 11: reopen the highest-id file as active; install the new
	// directory.
	let mut segments = HashMap::with_capacity(compact_id as usize + 1);
	for id in 0..=compact_id {
		segments.insert(id, Segment::open(&inner.dir, id)?);
	}
	inner.segments = segments;
	inner.curr_id = compact_id;
	inner.keydir.replace(new_keydir);

	log::info!(target: "caskstore", "compaction completed: {} segment(s)", compact_id + 1);
	Ok(())
}

// Skips tombstones defensively, the same way Get does.
fn live_entries(inner: &Inner) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
	let mut live = HashMap::with_capacity(inner.keydir.len());
	for (key, entry) in inner.keydir.iter() {
		let seg = inner.segments.get(&entry.segment_id).ok_or(Error::MissingSegment(entry.segment_id))?;
		let buf = seg.read_at(entry.offset, entry.size)?;
		let decoded = record::decode(&buf)?;
		if decoded.is_tombstone() {
			continue;
		}
		live.insert(key.clone(), decoded.value.to_vec());
	}
	Ok(live)
}

fn compact_path(tmp_dir: &std::path::Path, id: u64) -> std::path::PathBuf {
	tmp_dir.join(format!("{}{}{}", COMPACT_FILE_PREFIX, id, COMPACT_FILE_SUFFIX))
}

fn open_compact_segment(tmp_dir: &std::path::Path, id: u64) -> Result<Segment> {
	Segment::create_truncated_at(compact_path(tmp_dir, id), id)
}

fn finish_compact_segment(seg: Segment) -> Result<()> {
	seg.close()
}
