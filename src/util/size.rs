const KIB: i64 = 1024;
const MIB: i64 = 1024 * 1024;

/// Formats a byte count as `N Bytes`, `N.NN KiB` or `N.NN MiB`.
pub fn format_size(bytes: i64) -> String {
    if bytes < KIB {
        format!("{bytes} Bytes")
    } else if bytes < MIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    }
}
