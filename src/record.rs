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

// On-disk layout: [flags:1][key_len:u64-be][value_len:u64-be][key][value].
// No checksum; a truncated tail is the scanner's concern, not this codec's.

use std::convert::TryInto;

use crate::error::{Error, Result};

pub const HEADER_SIZE: usize = 1 + 8 + 8;
pub const TOMBSTONE_FLAG: u8 = 0x1;

// Borrows key/value from the input buffer.
pub struct Decoded<'a> {
	pub flags: u8,
	pub key: &'a [u8],
	pub value: &'a [u8],
}

impl<'a> Decoded<'a> {
	pub fn is_tombstone(&self) -> bool {
		self.flags & TOMBSTONE_FLAG == TOMBSTONE_FLAG
	}
}

// Tombstone records carry value_len = 0 and no value bytes.
pub fn encode(key: &[u8], value: &[u8], tombstone: bool) -> Vec<u8> {
	let value = if tombstone { &[][..] } else { value };
	let mut buf = Vec::with_capacity(HEADER_SIZE + key.len() + value.len());
	buf.push(if tombstone { TOMBSTONE_FLAG } else { 0 });
	buf.extend_from_slice(&(key.len() as u64).to_be_bytes());
	buf.extend_from_slice(&(value.len() as u64).to_be_bytes());
	buf.extend_from_slice(key);
	buf.extend_from_slice(value);
	buf
}

pub fn decode(buf: &[u8]) -> Result<Decoded<'_>> {
	if buf.len() < HEADER_SIZE {
		return Err(Error::CorruptRecord(format!(
			"record shorter than header: {} < {}",
			buf.len(),
			HEADER_SIZE
		)));
	}
	let flags = buf[0];
	let key_len = u64::from_be_bytes(buf[1..9].try_into().unwrap()) as usize;
	let value_len = u64::from_be_bytes(buf[9..17].try_into().unwrap()) as usize;
	let end = HEADER_SIZE
		.checked_add(key_len)
		.and_then(|n| n.checked_add(value_len))
		.ok_or_else(|| Error::CorruptRecord("record length overflow".into()))?;
	if buf.len() < end {
		return Err(Error::CorruptRecord(format!(
			"record shorter than key+value span: {} < {}",
			buf.len(),
			end
		)));
	}
	let key = &buf[HEADER_SIZE..HEADER_SIZE + key_len];
	let value = &buf[HEADER_SIZE + key_len..end];
	Ok(Decoded { flags, key, value })
}
