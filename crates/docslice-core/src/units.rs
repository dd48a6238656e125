//! Size formatting for transfer reports
//!
//! Report sizes are always shown with exactly two fractional digits. Extra
//! digits are cut off, never rounded: `12.345` MB is shown as `12.34`.

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Render `value` with exactly two fractional digits, truncating.
///
/// Works on the shortest decimal rendering of the value, so `3.1` becomes
/// `3.10` and `3.14159` becomes `3.14`. Non-finite values are returned as-is.
pub fn trim_size(value: f64) -> String {
    let rendered = value.to_string();
    if !value.is_finite() {
        return rendered;
    }

    match rendered.find('.') {
        None => format!("{rendered}.00"),
        Some(period) => {
            let fraction_digits = rendered.len() - period - 1;
            match fraction_digits {
                0 => format!("{rendered}00"),
                1 => format!("{rendered}0"),
                2 => rendered,
                _ => rendered[..period + 3].to_string(),
            }
        }
    }
}

/// Size in megabytes, two truncated decimals (e.g. `"9.53"`)
pub fn format_mb(bytes: u64) -> String {
    trim_size(bytes as f64 / KB as f64 / KB as f64)
}

/// Size in kilobytes, two truncated decimals (e.g. `"256.00"`)
pub fn format_kb(bytes: u64) -> String {
    trim_size(bytes as f64 / KB as f64)
}

/// Human-readable size with a unit, for summaries and logs
pub fn fmt_bytes(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pads_short_fractions() {
        assert_eq!(trim_size(3.0), "3.00");
        assert_eq!(trim_size(3.1), "3.10");
        assert_eq!(trim_size(3.14), "3.14");
        assert_eq!(trim_size(0.0), "0.00");
    }

    #[test]
    fn truncates_instead_of_rounding() {
        assert_eq!(trim_size(3.14159), "3.14");
        assert_eq!(trim_size(12.345), "12.34");
        assert_eq!(trim_size(2.999), "2.99");
    }

    #[test]
    fn non_finite_passthrough() {
        assert_eq!(trim_size(f64::INFINITY), "inf");
        assert_eq!(trim_size(f64::NAN), "NaN");
    }

    #[test]
    fn report_units() {
        assert_eq!(format_kb(262_144), "256.00");
        assert_eq!(format_kb(1_611_392), "1573.62");
        assert_eq!(format_mb(10_000_000), "9.53");
        assert_eq!(format_mb(4_194_304), "4.00");
    }

    #[test]
    fn human_readable_units() {
        assert_eq!(fmt_bytes(512), "512 B");
        assert_eq!(fmt_bytes(1536), "1.5 KB");
        assert_eq!(fmt_bytes(10_000_000), "9.5 MB");
    }

    proptest! {
        #[test]
        fn always_two_fraction_digits(value in 0.0f64..1.0e9) {
            let s = trim_size(value);
            let period = s.find('.').expect("has a period");
            prop_assert_eq!(s.len() - period - 1, 2);
        }

        #[test]
        fn never_rounds_up(value in 0.0f64..1.0e6) {
            let shown: f64 = trim_size(value).parse().unwrap();
            prop_assert!(shown <= value + 1e-9, "{} shown as {}", value, shown);
        }
    }
}
