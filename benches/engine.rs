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

use caskstore::Engine;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::prelude::*;

criterion_group!(
	name = benches;
	config = Criterion::default().sample_size(20);
	targets = benchmark_put, benchmark_get, benchmark_compaction
);
criterion_main!(benches);

fn random_value(rng: &mut impl Rng, len: usize) -> Vec<u8> {
	let mut buf = vec![0u8; len];
	rng.fill_bytes(&mut buf);
	buf
}

fn benchmark_put(c: &mut Criterion) {
	let mut group = c.benchmark_group("engine/put");
	let mut rng = StdRng::seed_from_u64(42);

	group.bench_function("put_1kb_value", |b| {
		let dir = tempfile::tempdir().unwrap();
		let engine = Engine::open(dir.path()).unwrap();
		let mut i = 0u64;
		b.iter_batched(
			|| {
				i += 1;
				(format!("key-{}", i).into_bytes(), random_value(&mut rng, 1024))
			},
			|(key, value)| engine.put(&key, &value).unwrap(),
			BatchSize::SmallInput,
		);
	});
}

fn benchmark_get(c: &mut Criterion) {
	let mut group = c.benchmark_group("engine/get");
	let mut rng = StdRng::seed_from_u64(7);

	let dir = tempfile::tempdir().unwrap();
	let engine = Engine::open(dir.path()).unwrap();
	let keys: Vec<Vec<u8>> = (0..10_000)
		.map(|i| {
			let key = format!("key-{}", i).into_bytes();
			engine.put(&key, &random_value(&mut rng, 256)).unwrap();
			key
		})
		.collect();

	group.bench_function("get_from_10k_keys", |b| {
		let mut i = 0usize;
		b.iter_batched(
			|| {
				i = (i + 1) % keys.len();
				keys[i].clone()
			},
			|key| engine.get(&key).unwrap(),
			BatchSize::SmallInput,
		);
	});
}

fn benchmark_compaction(c: &mut Criterion) {
	let mut group = c.benchmark_group("engine/compaction");
	group.sample_size(10);
	let mut rng = StdRng::seed_from_u64(99);

	group.bench_function("compact_after_overwrite_churn", |b| {
		b.iter_batched(
			|| {
				let dir = tempfile::tempdir().unwrap();
				let engine = Engine::open(dir.path()).unwrap();
				for i in 0..2_000 {
					let key = format!("key-{}", i % 200).into_bytes();
					engine.put(&key, &random_value(&mut rng, 512)).unwrap();
				}
				(dir, engine)
			},
			|(_dir, engine)| engine.initiate_compaction().unwrap(),
			BatchSize::LargeInput,
		);
	});
}
