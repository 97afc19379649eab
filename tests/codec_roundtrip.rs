//! Codec round trips across every bit width.
//!
//! Values cluster around each power of two from 2^0 to 2^62 and their
//! negations, with small perturbations so runs of every width and every
//! width transition get exercised. Each sequence is split across as many
//! block payloads as it needs.
//!
//! Run with: cargo test --test codec_roundtrip

use proptest::prelude::*;
use ticktape::codec::{CodecKind, Decode, Encode};
use ticktape::types::PAYLOAD_SIZE;

const CODECS: [CodecKind; 3] = [CodecKind::Raw, CodecKind::Delta, CodecKind::DoubleDelta];

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Encode `values` into payload-sized chunks, returning each chunk's bytes
fn encode_blocks(codec: CodecKind, values: &[i64]) -> Vec<(Vec<u8>, usize)> {
    let mut blocks = Vec::new();
    let mut encoder = codec.encoder(vec![0u8; PAYLOAD_SIZE]);
    for &v in values {
        if !encoder.write(v) {
            blocks.push((encoder.encoded().to_vec(), encoder.count()));
            encoder = codec.encoder(vec![0u8; PAYLOAD_SIZE]);
            assert!(encoder.write(v), "empty block rejected {}", v);
        }
    }
    if encoder.count() > 0 {
        blocks.push((encoder.encoded().to_vec(), encoder.count()));
    }
    blocks
}

fn decode_blocks(codec: CodecKind, blocks: Vec<(Vec<u8>, usize)>) -> Vec<i64> {
    let mut out = Vec::new();
    for (bytes, count) in blocks {
        let mut decoder = codec.decoder(bytes);
        let before = out.len();
        while let Some(v) = decoder.read() {
            out.push(v);
        }
        assert_eq!(out.len() - before, count);
        assert_eq!(decoder.count(), count);
    }
    out
}

fn round_trip(codec: CodecKind, values: &[i64]) -> Vec<i64> {
    decode_blocks(codec, encode_blocks(codec, values))
}

/// 60 values near `base`: +1/+2/+4/+8 offsets plus a growing square
fn boundary_values(base: i64) -> Vec<i64> {
    (0..60i64)
        .map(|j| {
            let step = [1i64, 2, 4, 8][(j % 4) as usize];
            base.wrapping_add(step).wrapping_add(j * j)
        })
        .collect()
}

// ============================================================================
// BOUNDARY TESTS
// ============================================================================

#[test]
fn test_bit_width_boundaries() {
    for codec in CODECS {
        for shift in 0..=62 {
            let base = 1i64 << shift;
            for values in [boundary_values(base), boundary_values(-base)] {
                assert_eq!(round_trip(codec, &values), values, "{:?} around {}", codec, base);
            }
        }
    }
}

#[test]
fn test_all_boundaries_in_one_stream() {
    let values: Vec<i64> = (0..=62)
        .flat_map(|shift| {
            let base = 1i64 << shift;
            let mut v = boundary_values(base);
            v.extend(boundary_values(-base));
            v
        })
        .collect();
    for codec in CODECS {
        assert_eq!(round_trip(codec, &values), values, "{:?}", codec);
    }
}

#[test]
fn test_extremes() {
    let values = vec![0, i64::MAX, i64::MIN, -1, 1, i64::MIN, i64::MAX, 0];
    for codec in CODECS {
        assert_eq!(round_trip(codec, &values), values, "{:?}", codec);
    }
}

#[test]
fn test_constant_series_packs_tightly() {
    let values = vec![4_307_000i64; 10_000];
    let blocks = encode_blocks(CodecKind::Delta, &values);
    // zero deltas carry no payload bits
    assert_eq!(blocks.len(), 1);
    assert_eq!(round_trip(CodecKind::Delta, &values), values);
}

#[test]
fn test_seek_matches_read() {
    let values: Vec<i64> = (0..500i64).map(|i| 1_000_000 + i * 3 + (i % 7)).collect();
    for codec in CODECS {
        let blocks = encode_blocks(codec, &values);
        assert_eq!(blocks.len(), 1);
        let bytes = blocks[0].0.clone();
        for n in [0usize, 1, 255, 256, 257, 499] {
            let mut decoder = codec.decoder(bytes.clone());
            assert!(decoder.seek(n));
            assert_eq!(decoder.read(), Some(values[n]), "{:?} seek {}", codec, n);
        }
        let mut decoder = codec.decoder(bytes);
        assert!(!decoder.seek(501));
    }
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #[test]
    fn prop_round_trip(values in proptest::collection::vec(any::<i64>(), 0..2000)) {
        for codec in CODECS {
            prop_assert_eq!(round_trip(codec, &values), values.clone());
        }
    }

    #[test]
    fn prop_round_trip_small_steps(start in any::<i64>(), steps in proptest::collection::vec(-1000i64..1000, 0..2000)) {
        let values: Vec<i64> = steps
            .iter()
            .scan(start, |acc, &s| {
                *acc = acc.wrapping_add(s);
                Some(*acc)
            })
            .collect();
        for codec in CODECS {
            prop_assert_eq!(round_trip(codec, &values), values.clone());
        }
    }
}
