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

// Line format for a separate CLI inspection tool this crate does not build.

pub fn format_record_line(offset: u64, flags: u8, key: &[u8], value: &[u8]) -> String {
	format!(
		"offset={} flags={:02x} key={:?} value={:?}",
		offset,
		flags,
		String::from_utf8_lossy(key),
		String::from_utf8_lossy(value)
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn formats_a_plain_record() {
		let line = format_record_line(0, 0x00, b"foo", b"bar");
		assert_eq!(line, "offset=0 flags=00 key=\"foo\" value=\"bar\"");
	}

	#[test]
	fn formats_a_tombstone() {
		let line = format_record_line(17, 0x01, b"foo", b"");
		assert_eq!(line, "offset=17 flags=01 key=\"foo\" value=\"\"");
	}
}
