//! Ephemeral address generation.

use rand::distributions::Alphanumeric;
use rand::Rng;

const SUFFIX_LEN: usize = 16;

/// Generate an address under `prefix` that will not collide with other generated addresses.
///
/// Addresses are compared byte for byte, so the random suffix alone keeps them apart.
pub fn unique_address(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("{}/{}", prefix.trim_end_matches('/'), suffix)
}
