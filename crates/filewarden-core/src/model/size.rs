/// Human-readable byte counts for chat replies.
///
/// Archive replies report their payload size; everything internal stays in
/// `u64` bytes and floating point only appears at the formatting boundary.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count using binary multiples (1 KB = 1024 B).
///
/// Bytes are printed as integers, KB/MB with one decimal, GB and above with two.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    match unit {
        0 => format!("{bytes} B"),
        1 | 2 => format!("{value:.1} {}", UNITS[unit]),
        _ => format!("{value:.2} {}", UNITS[unit]),
    }
}

/// Pluralise a counted noun: `1 file`, `3 files`.
pub fn count_noun(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
