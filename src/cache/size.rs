//! Size Estimator Module
//!
//! Approximates the byte size of cached values for memory-bounded eviction.

use std::mem;

use serde::Serialize;
use tracing::debug;

// == Estimate Size ==
/// Returns an approximate byte size for `value`.
///
/// The primary strategy is the length of the value's JSON encoding. When
/// JSON cannot represent the value (for example a map with non-string keys),
/// the length of its bincode encoding is used instead, which still counts
/// every element. Only a value neither format can encode falls back to twice
/// its in-memory size. Identical input always yields the same estimate.
pub fn estimate_size<V: Serialize + ?Sized>(value: &V) -> u64 {
    match serde_json::to_vec(value) {
        Ok(bytes) => bytes.len() as u64,
        Err(err) => {
            debug!("JSON size estimation failed, using bincode: {}", err);
            binary_size(value)
        }
    }
}

fn binary_size<V: Serialize + ?Sized>(value: &V) -> u64 {
    match bincode::serialized_size(value) {
        Ok(size) => size,
        Err(err) => {
            debug!("Size estimation fell back to heuristic: {}", err);
            heuristic_size(value)
        }
    }
}

fn heuristic_size<V: ?Sized>(value: &V) -> u64 {
    (mem::size_of_val(value) as u64).saturating_mul(2)
}
