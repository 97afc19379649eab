//! ticktape - demo binary
//!
//! Writes a synthetic price series to a file-backed store, reads it back
//! by value, and prints running statistics.
//!
//! Usage: `ticktape [DIR]` (defaults to a directory under the system temp
//! dir). Set `RUST_LOG=ticktape=debug` to see block rotation and eviction.

use std::path::PathBuf;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use ticktape::types::decimal::parse;
use ticktape::{CodecKind, FileBackend, FileBackendConfig, StatsTree, Store, StoreConfig};

fn main() -> ticktape::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("ticktape-demo"));

    println!("===========================================");
    println!("  ticktape - block store demo");
    println!("===========================================");
    println!();

    let backend = FileBackend::new(FileBackendConfig::new(&dir))?;
    let mut store = Store::new(StoreConfig { max_bufs: 16 }, backend)?;
    let px = store.alloc(CodecKind::Delta, Box::new(|_| {}));
    store.open(px, "demo", "px")?;
    let start = store.count(px);

    // slow random walk in cents
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut cents: i64 = 4_200_00;
    for _ in 0..10_000 {
        cents += rng.gen_range(0..5);
        store.write(px, Decimal::new(cents, 2))?;
    }
    store.sync(px)?;

    info!(
        count = store.count(px),
        blocks = store.block_count(px),
        "wrote series"
    );
    println!("Directory:  {}", dir.display());
    println!("Values:     {} ({} new)", store.count(px), store.count(px) - start);
    println!("Blocks:     {}", store.block_count(px));
    println!("Resident:   {}", store.cache().len());
    println!();

    let target = parse("4300.00").unwrap_or_default();
    let mut reader = store.index(px, target);
    println!("First value >= {} at offset {}", target, reader.offset());

    let mut stats = StatsTree::new();
    while let Some(value) = reader.read(&mut store) {
        stats.add(value);
    }
    if let (Some(min), Some(max), Some(median)) = (stats.minimum(), stats.maximum(), stats.median()) {
        println!("  count   {}", stats.count());
        println!("  min     {}", min);
        println!("  median  {}", median);
        println!("  max     {}", max);
        println!("  mean    {:.4}", stats.mean().unwrap_or_default());
        println!("  std     {:.4}", stats.std().unwrap_or_default());
    }

    store.save_schema(px)?;
    let schema = store.load_schema(px)?;
    println!();
    println!("Schema {:?}: {} values", schema.name(), schema.count);

    store.finish()
}
