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

// A log-structured, append-only key-value storage engine. The consensus
// layer, HTTP surface, and CLI inspection tool are external collaborators,
// not part of this crate.

mod compaction;
mod engine;
mod error;
mod inspect;
mod keydir;
mod record;
mod segment;
mod snapshot;

pub use engine::{Engine, Options, DEFAULT_MAX_SEGMENT_SIZE};
pub use error::{Error, Result};
pub use inspect::format_record_line;
pub use snapshot::{decode as decode_snapshot, persist as persist_snapshot, restore as restore_snapshot, snapshot, SnapshotSink, VecSink};
