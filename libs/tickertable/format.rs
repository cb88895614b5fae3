//! Display formatting for raw field values.
//!
//! Pure functions, no state. Anything unparseable degrades to a
//! best-effort string; nothing here panics on bad input.

use crate::model::RawValue;

/// Format a value as a currency amount, e.g. `$64,250.50`
pub fn format_currency(value: &RawValue) -> String {
    match value.as_number() {
        Some(n) => format!("${}", group_thousands(n, 2)),
        None => fallback_text(value),
    }
}

/// Format a value as a signed percentage, e.g. `+2.41%`
pub fn format_percent(value: &RawValue) -> String {
    match value.as_number() {
        Some(n) => {
            let sign = if n > 0.0 { "+" } else { "" };
            format!("{}{:.2}%", sign, n)
        }
        None => fallback_text(value),
    }
}

/// Format a value with a compact magnitude suffix, e.g. `1.25B`
pub fn format_compact(value: &RawValue) -> String {
    let n = match value.as_number() {
        Some(n) => n,
        None => return fallback_text(value),
    };
    let abs = n.abs();
    let (scaled, suffix) = if abs >= 1e9 {
        (n / 1e9, "B")
    } else if abs >= 1e6 {
        (n / 1e6, "M")
    } else if abs >= 1e3 {
        (n / 1e3, "K")
    } else {
        (n, "")
    };
    if suffix.is_empty() {
        format!("{:.2}", scaled)
    } else {
        format!("{:.2}{}", scaled, suffix)
    }
}

/// Format a second count as a short duration, e.g. `1h 4m` or `23s`
pub fn format_duration(value: &RawValue) -> String {
    let secs = match value.as_number() {
        Some(n) if n >= 0.0 => n as u64,
        _ => return fallback_text(value),
    };
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {}m", h, m)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Plain text rendering, used for name/status columns
pub fn format_text(value: &RawValue) -> String {
    fallback_text(value)
}

fn fallback_text(value: &RawValue) -> String {
    value.as_text().unwrap_or_default()
}

/// Insert thousands separators into the integer part of `n`
fn group_thousands(n: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    let digits = int_part.as_bytes();
    for (i, b) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*b as char);
    }

    let sign = if n < 0.0 { "-" } else { "" };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}
