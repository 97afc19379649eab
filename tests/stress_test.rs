//! Stress tests for the ticktape store.
//!
//! These tests verify:
//! 1. The block cache stays within its budget under random load
//! 2. The stats tree agrees with a sorted reference under random churn
//! 3. Encoding is deterministic: same input, same block images
//! 4. Long series read back intact
//!
//! ## Running Stress Tests
//!
//! ```bash
//! # Run all stress tests (release mode recommended)
//! cargo test --release --test stress_test -- --nocapture
//!
//! # Run specific test
//! cargo test --release --test stress_test stress_cache_bounded -- --nocapture
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use ticktape::{
    Block, BlockCache, BlockHdr, BlockKey, CodecKind, NullBackend, StatsTree, Store, StoreConfig,
};

// ============================================================================
// TEST CONSTANTS
// ============================================================================

/// Cache inserts in the cache stress test
const CACHE_INSERTS: usize = 200_000;

/// Cache budget in the cache stress test
const CACHE_BUDGET: usize = 512;

/// Values written in the long series test
const SERIES_VALUES: usize = 500_000;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Non-decreasing walk in cents from 50000.00, with occasional precision
/// changes.
///
/// Same seed = same values.
fn generate_walk(count: usize, seed: u64) -> Vec<Decimal> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut cents: i64 = 5_000_000;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        cents += rng.gen_range(0..=50);
        // one in a thousand ticks quoted to an extra place
        let value = if rng.gen_ratio(1, 1000) {
            Decimal::new(cents * 10, 3)
        } else {
            Decimal::new(cents, 2)
        };
        values.push(value);
    }
    values
}

/// Write a walk into a fresh in-memory store and hash every block image.
fn run_deterministic_sequence(seed: u64, count: usize) -> [u8; 32] {
    let mut store = Store::new(StoreConfig { max_bufs: 1 << 20 }, NullBackend::new()).unwrap();
    let id = store.alloc(CodecKind::Delta, Box::new(|_| {}));
    for value in generate_walk(count, seed) {
        store.write(id, value).unwrap();
    }
    store.close(id).unwrap();

    let mut blocks: Vec<&Arc<Block>> = store.cache().iter_lru().collect();
    blocks.sort_by_key(|b| b.index());
    let mut hasher = Sha256::new();
    for block in blocks {
        hasher.update(block.to_image());
    }
    hasher.finalize().into()
}

// ============================================================================
// STRESS TESTS
// ============================================================================

/// Random inserts and lookups across many series never exceed the budget,
/// and every eviction reaches the owning series' callback.
#[test]
fn stress_cache_bounded() {
    println!("\n=== CACHE STRESS TEST ===\n");

    const SERIES: u32 = 16;

    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut cache = BlockCache::new(CACHE_BUDGET);
    let unloads = Rc::new(Cell::new(0u64));
    for _ in 0..SERIES {
        let counter = Rc::clone(&unloads);
        cache.alloc(Box::new(move |_| counter.set(counter.get() + 1)));
    }

    let mut next_index = vec![0u32; SERIES as usize];
    let mut hits = 0u64;
    let mut max_len = 0;

    let start = Instant::now();
    for _ in 0..CACHE_INSERTS {
        let series = rng.gen_range(0..SERIES);
        if rng.gen_bool(0.5) && next_index[series as usize] > 0 {
            let index = rng.gen_range(0..next_index[series as usize]);
            if cache.fetch(BlockKey::new(series, index)).is_some() {
                hits += 1;
            }
        }
        let index = next_index[series as usize];
        next_index[series as usize] += 1;
        let block = Block::new(BlockKey::new(series, index), BlockHdr::new(index as u64, 0), &[]);
        cache.insert(Arc::new(block));
        max_len = max_len.max(cache.len());
    }
    let elapsed = start.elapsed();

    println!("  Inserts:           {:>12}", CACHE_INSERTS);
    println!("  Hits:              {:>12}", hits);
    println!("  Evictions:         {:>12}", cache.evictions());
    println!("  Resident:          {:>12}", cache.len());
    println!("  Elapsed time:      {:>12.2?}", elapsed);

    assert!(max_len <= CACHE_BUDGET, "cache grew to {}", max_len);
    assert_eq!(cache.len(), CACHE_BUDGET);
    assert_eq!(cache.evictions(), (CACHE_INSERTS - CACHE_BUDGET) as u64);
    assert_eq!(unloads.get(), cache.evictions());

    println!("\n=== CACHE STRESS TEST PASSED ===\n");
}

/// Random adds and deletes against a sorted `Vec` reference.
#[test]
fn stress_stats_tree_against_reference() {
    println!("\n=== STATS TREE STRESS TEST ===\n");

    const OPS: usize = 50_000;

    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut tree = StatsTree::new();
    let mut reference: Vec<Decimal> = Vec::new();

    let start = Instant::now();
    for i in 0..OPS {
        let value = Decimal::new(rng.gen_range(0..500), 1);
        if rng.gen_bool(0.4) {
            let present = reference.binary_search(&value);
            assert_eq!(tree.del(value), present.is_ok(), "del {} at op {}", value, i);
            if let Ok(pos) = present {
                reference.remove(pos);
            }
        } else {
            tree.add(value);
            let pos = reference.partition_point(|v| *v <= value);
            reference.insert(pos, value);
        }

        if i % 97 == 0 {
            assert_eq!(tree.count(), reference.len() as u64);
            assert_eq!(tree.minimum(), reference.first().copied());
            assert_eq!(tree.maximum(), reference.last().copied());
            if !reference.is_empty() {
                let k = rng.gen_range(0..reference.len());
                assert_eq!(tree.order(k as u64), Some(reference[k]));
                let probe = reference[k];
                assert_eq!(tree.order_of(probe), reference.partition_point(|v| *v < probe) as u64);
            }
        }
    }
    let elapsed = start.elapsed();

    let flattened: Vec<Decimal> = tree
        .iter()
        .flat_map(|(value, count)| std::iter::repeat(value).take(count as usize))
        .collect();
    assert_eq!(flattened, reference);

    println!("  Operations:        {:>12}", OPS);
    println!("  Final count:       {:>12}", tree.count());
    println!("  Distinct values:   {:>12}", tree.distinct());
    println!("  Elapsed time:      {:>12.2?}", elapsed);

    println!("\n=== STATS TREE STRESS TEST PASSED ===\n");
}

/// Verify determinism: same values produce identical block images.
#[test]
fn verify_determinism() {
    println!("\n=== DETERMINISM TEST ===\n");

    const TEST_COUNT: usize = 20_000;
    const SEED: u64 = 12345;

    println!("Writing {} values (seed={})...", TEST_COUNT, SEED);

    let root1 = run_deterministic_sequence(SEED, TEST_COUNT);
    let root2 = run_deterministic_sequence(SEED, TEST_COUNT);

    println!("  Run 1 block digest: {}", hex::encode(root1));
    println!("  Run 2 block digest: {}", hex::encode(root2));
    assert_eq!(root1, root2, "block images must match for the same input");

    let root3 = run_deterministic_sequence(SEED + 1, TEST_COUNT);
    println!("  Different seed:     {}", hex::encode(root3));
    assert_ne!(root1, root3, "different seeds should produce different blocks");

    println!("\n=== DETERMINISM VERIFIED ===\n");
}

/// Write a long series and read it all back.
#[test]
fn stress_long_series() {
    println!("\n=== LONG SERIES TEST ===\n");

    let values = generate_walk(SERIES_VALUES, 42);
    let mut store = Store::new(StoreConfig { max_bufs: 1 << 20 }, NullBackend::new()).unwrap();
    let id = store.alloc(CodecKind::Delta, Box::new(|_| {}));

    let start = Instant::now();
    for &value in &values {
        store.write(id, value).unwrap();
    }
    let write_elapsed = start.elapsed();

    let start = Instant::now();
    let mut reader = store.reader(id, 0);
    let mut read = 0usize;
    while let Some(value) = reader.read(&mut store) {
        assert_eq!(value, values[read], "mismatch at offset {}", read);
        assert_eq!(value.scale(), values[read].scale());
        read += 1;
    }
    let read_elapsed = start.elapsed();

    let blocks = store.block_count(id);
    println!("  Values:            {:>12}", SERIES_VALUES);
    println!("  Blocks:            {:>12}", blocks);
    println!("  Values per block:  {:>12.1}", SERIES_VALUES as f64 / blocks as f64);
    println!("  Write time:        {:>12.2?}", write_elapsed);
    println!("  Read time:         {:>12.2?}", read_elapsed);
    println!(
        "  Write throughput:  {:>12.0} values/sec",
        SERIES_VALUES as f64 / write_elapsed.as_secs_f64()
    );

    assert_eq!(read, SERIES_VALUES);
    assert_eq!(store.count(id), SERIES_VALUES as u64);

    // seek by value lands on the first value at or above the target
    let target = values[SERIES_VALUES / 2];
    let mut reader = store.index(id, target);
    let found = reader.read(&mut store);
    assert!(found.is_some_and(|v| v >= target));

    println!("\n=== LONG SERIES TEST PASSED ===\n");
}
