use crate::identity::SubscriberId;
use core::fmt::Write;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU32, Ordering};

/// Random value fixed for the lifetime of the process.
static PROCESS_UNIQUE: LazyLock<[u8; 5]> = LazyLock::new(rand::random::<[u8; 5]>);

/// 24-bit counter seeded at a random point.
static COUNTER: LazyLock<AtomicU32> =
    LazyLock::new(|| AtomicU32::new(rand::random::<u32>() & 0x00ff_ffff));

/// Returns a new 24 character hex object id.
///
/// Layout: 4 bytes of Unix seconds, 5 process-unique random bytes, then a
/// 3 byte wrapping counter. Ids minted by one process never repeat within the
/// same second until the counter wraps (16M ids).
pub fn next_object_id() -> SubscriberId {
    let seconds = chrono::Utc::now().timestamp() as u32;
    let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

    let mut out = String::with_capacity(24);
    // Writing to a String cannot fail.
    let _ = write!(out, "{seconds:08x}");
    for byte in PROCESS_UNIQUE.iter() {
        let _ = write!(out, "{byte:02x}");
    }
    let _ = write!(out, "{count:06x}");
    SubscriberId::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_24_hex_and_unique() {
        let ids: Vec<SubscriberId> = (0..2048).map(|_| next_object_id()).collect();
        assert!(ids.iter().all(|id| {
            id.as_str().len() == 24 && id.as_str().bytes().all(|b| b.is_ascii_hexdigit())
        }));
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }
}
