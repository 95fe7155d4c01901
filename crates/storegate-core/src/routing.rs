//! Deterministic object → backend routing.
//!
//! The router hashes the object id with 64-bit FNV-1a and picks the node
//! at position `hash % len` of the snapshot ordered by `node_index`.
//! Ordering first makes the choice independent of the order in which the
//! control plane happened to list the backends, so put and get agree for
//! any permutation of the same backend set. Changing the number of backends
//! reshuffles most ids; there is no rebalancing.

use crate::error::{GatewayError, GatewayResult};
use crate::node::BackendNode;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hash.
///
/// ```
/// # use storegate_core::routing::fnv1a_64;
/// assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
/// assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
/// ```
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Position selected for `object_id` among `count` nodes.
///
/// Returns `None` when there are no nodes.
///
/// ```
/// # use storegate_core::routing::select_position;
/// assert_eq!(select_position("abc123", 0), None);
/// assert_eq!(select_position("abc123", 1), Some(0));
/// ```
pub fn select_position(object_id: &str, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    Some((fnv1a_64(object_id.as_bytes()) % count as u64) as usize)
}

/// Select the backend responsible for `object_id`.
///
/// Fails with [`GatewayError::NoBackendsAvailable`] when `nodes` is empty.
/// Any string is a valid key.
pub fn select_backend<'a>(
    object_id: &str,
    nodes: &'a [BackendNode],
) -> GatewayResult<&'a BackendNode> {
    let mut ordered: Vec<&BackendNode> = nodes.iter().collect();
    ordered.sort_by_key(|node| node.node_index);

    let position = select_position(object_id, ordered.len())
        .ok_or_else(|| GatewayError::no_backends(object_id))?;
    Ok(ordered[position])
}
