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

// Wire format: [count:u64-be] then, per pair,
// [key_len:u64-be][key][value_len:u64-be][value]. Same big-endian,
// length-prefixed convention as the record codec.

use std::collections::HashMap;
use std::convert::TryInto;
use std::io;

use crate::engine::Engine;
use crate::error::{Error, Result};

// The consensus layer owns the sink's lifecycle and may cancel it mid-write.
pub trait SnapshotSink {
	fn write(&mut self, buf: &[u8]) -> io::Result<()>;
	fn cancel(&mut self) -> io::Result<()>;
	fn close(&mut self) -> io::Result<()>;
}

#[derive(Default)]
pub struct VecSink {
	pub buf: Vec<u8>,
	pub cancelled: bool,
	pub closed: bool,
}

impl SnapshotSink for VecSink {
	fn write(&mut self, buf: &[u8]) -> io::Result<()> {
		self.buf.extend_from_slice(buf);
		Ok(())
	}

	fn cancel(&mut self) -> io::Result<()> {
		self.cancelled = true;
		Ok(())
	}

	fn close(&mut self) -> io::Result<()> {
		self.closed = true;
		Ok(())
	}
}

pub fn snapshot(engine: &Engine) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
	engine.entries()
}

// Any write failure cancels the sink and surfaces the I/O error to the
// caller.
pub fn persist(data: &HashMap<Vec<u8>, Vec<u8>>, sink: &mut dyn SnapshotSink) -> Result<()> {
	match persist_inner(data, sink) {
		Ok(()) => {
			sink.close().map_err(Error::io)?;
			Ok(())
		}
		Err(e) => {
			let _ = sink.cancel();
			Err(e)
		}
	}
}

fn persist_inner(data: &HashMap<Vec<u8>, Vec<u8>>, sink: &mut dyn SnapshotSink) -> Result<()> {
	sink.write(&(data.len() as u64).to_be_bytes()).map_err(Error::io)?;
	for (key, value) in data {
		sink.write(&(key.len() as u64).to_be_bytes()).map_err(Error::io)?;
		sink.write(key).map_err(Error::io)?;
		sink.write(&(value.len() as u64).to_be_bytes()).map_err(Error::io)?;
		sink.write(value).map_err(Error::io)?;
	}
	Ok(())
}

pub fn decode(mut bytes: &[u8]) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
	let count = read_u64(&mut bytes)?;
	let mut out = HashMap::with_capacity(count as usize);
	for _ in 0..count {
		let key_len = read_u64(&mut bytes)?;
		let key = read_bytes(&mut bytes, key_len)?;
		let value_len = read_u64(&mut bytes)?;
		let value = read_bytes(&mut bytes, value_len)?;
		out.insert(key, value);
	}
	Ok(out)
}

pub fn restore(engine: &Engine, bytes: &[u8]) -> Result<()> {
	let data = decode(bytes)?;
	engine.restore_from_snapshot(data)
}

fn read_u64(bytes: &mut &[u8]) -> Result<u64> {
	if bytes.len() < 8 {
		return Err(Error::CorruptRecord("snapshot stream truncated reading a length".into()));
	}
	let (head, tail) = bytes.split_at(8);
	*bytes = tail;
	Ok(u64::from_be_bytes(head.try_into().unwrap()))
}

fn read_bytes(bytes: &mut &[u8], len: u64) -> Result<Vec<u8>> {
	let len = len as usize;
	if bytes.len() < len {
		return Err(Error::CorruptRecord("snapshot stream truncated reading a payload".into()));
	}
	let (head, tail) = bytes.split_at(len);
	*bytes = tail;
	Ok(head.to_vec())
}
