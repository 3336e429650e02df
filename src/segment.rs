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

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DATA_FILE_PREFIX: &str = "data-";
pub const DATA_FILE_SUFFIX: &str = ".db";

pub const WRITER_BUF_CAPACITY: usize = 4096;

pub fn segment_file_name(id: u64) -> String {
	format!("{}{}{}", DATA_FILE_PREFIX, id, DATA_FILE_SUFFIX)
}

pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
	dir.join(segment_file_name(id))
}

// Returns None for anything that doesn't match data-<N>.db, so callers can
// skip unrelated files.
pub fn parse_segment_id(file_name: &str) -> Option<u64> {
	file_name
		.strip_prefix(DATA_FILE_PREFIX)?
		.strip_suffix(DATA_FILE_SUFFIX)?
		.parse()
		.ok()
}

pub struct Segment {
	pub id: u64,
	path: PathBuf,
	file: File,
	writer: BufWriter<File>,
	offset: u64,
}

impl Segment {
	// Creates the file if absent and positions the write cursor at end-of-file.
	pub fn open(dir: &Path, id: u64) -> Result<Segment> {
		let path = segment_path(dir, id);
		let file = OpenOptions::new()
			.create(true)
			.read(true)
			.write(true)
			.open(&path)
			.map_err(|e| Error::io_at(&path, e))?;
		let writer_handle = file.try_clone().map_err(|e| Error::io_at(&path, e))?;
		let mut writer = BufWriter::with_capacity(WRITER_BUF_CAPACITY, writer_handle);
		let offset = writer.seek(SeekFrom::End(0)).map_err(|e| Error::io_at(&path, e))?;
		Ok(Segment { id, path, file, writer, offset })
	}

	// Truncates the file if it already exists; used by restore_from_snapshot
	// to start from an empty data-0.db.
	pub fn create_truncated(dir: &Path, id: u64) -> Result<Segment> {
		Segment::create_truncated_at(segment_path(dir, id), id)
	}

	// Same, but at an arbitrary path rather than the canonical data-<id>.db
	// name, used by the compactor to write data-compact-<id>.db files into a
	// temporary directory before they are renamed into place.
	pub fn create_truncated_at(path: PathBuf, id: u64) -> Result<Segment> {
		let file = OpenOptions::new()
			.create(true)
			.truncate(true)
			.read(true)
			.write(true)
			.open(&path)
			.map_err(|e| Error::io_at(&path, e))?;
		let writer_handle = file.try_clone().map_err(|e| Error::io_at(&path, e))?;
		let writer = BufWriter::with_capacity(WRITER_BUF_CAPACITY, writer_handle);
		Ok(Segment { id, path, file, writer, offset: 0 })
	}

	pub fn offset(&self) -> u64 {
		self.offset
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	// Flushes before returning, so a subsequent read_at of this range is
	// guaranteed to observe it.
	pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
		let start = self.offset;
		self.writer.write_all(bytes).map_err(|e| Error::io_at(&self.path, e))?;
		self.flush()?;
		self.offset += bytes.len() as u64;
		Ok(start)
	}

	pub fn flush(&mut self) -> Result<()> {
		self.writer.flush().map_err(|e| Error::io_at(&self.path, e))
	}

	// fdatasync-equivalent. Not called per record, only at rotation,
	// compaction, and close.
	pub fn sync(&self) -> Result<()> {
		self.file.sync_data().map_err(|e| Error::io_at(&self.path, e))
	}

	pub fn read_at(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
		let mut buf = vec![0u8; len as usize];
		self.file.read_exact_at(&mut buf, offset).map_err(|e| Error::io_at(&self.path, e))?;
		Ok(buf)
	}

	pub fn reopen_for_read(&mut self) -> Result<()> {
		let file = OpenOptions::new().read(true).write(true).open(&self.path).map_err(|e| Error::io_at(&self.path, e))?;
		let writer_handle = file.try_clone().map_err(|e| Error::io_at(&self.path, e))?;
		self.writer = BufWriter::with_capacity(WRITER_BUF_CAPACITY, writer_handle);
		self.file = file;
		Ok(())
	}

	pub fn close(mut self) -> Result<()> {
		self.flush()?;
		self.sync()
	}
}
