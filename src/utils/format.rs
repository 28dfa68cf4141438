const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human-readable file size with binary (1024) steps. Whole multiples
/// render without a decimal, everything else with one.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if value.fract() == 0.0 {
        format!("{} {}", value as u64, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_common_sizes() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1_048_576), "1 MB");
        assert_eq!(format_file_size(5_242_880), "5 MB");
    }

    #[test]
    fn boundaries_step_up_exactly_at_1024() {
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1025), "1.0 KB");
        assert_eq!(format_file_size(1024 * 1024 - 1), "1024.0 KB");
    }

    #[test]
    fn tops_out_at_terabytes() {
        assert_eq!(format_file_size(1u64 << 40), "1 TB");
        assert_eq!(format_file_size(1u64 << 50), "1024 TB");
    }
}
