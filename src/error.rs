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

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	KeyNotFound,
	Io { path: Option<PathBuf>, source: io::Error },
	CorruptRecord(String),
	MissingSegment(u64),
	UnknownOperation(String),
}

impl Error {
	pub fn io(source: io::Error) -> Error {
		Error::Io { path: None, source }
	}

	pub fn io_at(path: impl Into<PathBuf>, source: io::Error) -> Error {
		Error::Io { path: Some(path.into()), source }
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::KeyNotFound => write!(f, "key not found"),
			Error::Io { path: Some(path), source } => write!(f, "io error at {}: {}", path.display(), source),
			Error::Io { path: None, source } => write!(f, "io error: {}", source),
			Error::CorruptRecord(msg) => write!(f, "corrupt record: {}", msg),
			Error::MissingSegment(id) => write!(f, "missing segment {}", id),
			Error::UnknownOperation(op) => write!(f, "unknown operation: {}", op),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io { source, .. } => Some(source),
			_ => None,
		}
	}
}

impl From<io::Error> for Error {
	fn from(source: io::Error) -> Error {
		Error::io(source)
	}
}
