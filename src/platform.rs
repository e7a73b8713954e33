//! # Platform — Cache Geometry and Core-Count Detection
//!
//! Two host facts feed the engine: the L2 data cache size (drives the
//! cache-aware VX selection) and the logical core count (clamps worker
//! fan-out in the range driver). Detection failures fall back to
//! conservative defaults; they never fail the caller.

/// Conservative L2 fallback: 256 Kbit.
const DEFAULT_L2_BITS: u64 = 256 * 1024;

/// L2 data cache capacity in bits.
///
/// On Linux this reads the cpu0 cache hierarchy from sysfs; elsewhere (or
/// when sysfs is unreadable) a conservative 256 Kbit default applies.
pub fn l2_cache_size_bits() -> u64 {
    read_l2_bits().unwrap_or(DEFAULT_L2_BITS)
}

#[cfg(target_os = "linux")]
fn read_l2_bits() -> Option<u64> {
    let raw = std::fs::read_to_string("/sys/devices/system/cpu/cpu0/cache/index2/size").ok()?;
    parse_cache_size_bits(raw.trim())
}

#[cfg(not(target_os = "linux"))]
fn read_l2_bits() -> Option<u64> {
    None
}

/// Parse a sysfs cache size string ("512K", "4M", "262144") into bits.
fn parse_cache_size_bits(raw: &str) -> Option<u64> {
    let (digits, multiplier) = match raw.as_bytes().last()? {
        b'K' | b'k' => (&raw[..raw.len() - 1], 1024u64),
        b'M' | b'm' => (&raw[..raw.len() - 1], 1024 * 1024),
        _ => (raw, 1),
    };
    let bytes = digits.parse::<u64>().ok()?.checked_mul(multiplier)?;
    bytes.checked_mul(8)
}

/// Logical core count as seen by the rayon pool.
pub fn cpu_cores() -> usize {
    rayon::current_num_threads().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cache_sizes() {
        assert_eq!(parse_cache_size_bits("512K"), Some(512 * 1024 * 8));
        assert_eq!(parse_cache_size_bits("4M"), Some(4 * 1024 * 1024 * 8));
        assert_eq!(parse_cache_size_bits("262144"), Some(262144 * 8));
        assert_eq!(parse_cache_size_bits(""), None);
        assert_eq!(parse_cache_size_bits("junk"), None);
    }

    #[test]
    fn detection_never_fails() {
        assert!(l2_cache_size_bits() > 0);
        assert!(cpu_cores() >= 1);
    }
}
