/// Returns "18,429,385" style grouping.
pub fn format_tokens(tokens: u64) -> String {
    group_thousands(&tokens.to_string())
}

/// Returns "+1,234" / "-1,234" / "+0".
pub fn format_token_delta(delta: i64) -> String {
    let sign = if delta < 0 { '-' } else { '+' };
    format!("{}{}", sign, group_thousands(&delta.unsigned_abs().to_string()))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Returns "$1.24770" (five decimals, the resolution of the daily report).
pub fn format_usd(amount: f64) -> String {
    format!("${:.5}", amount)
}

/// Returns "$+0.12345" / "$-0.12345".
pub fn format_usd_delta(delta: f64) -> String {
    format!("${:+.5}", delta)
}

/// Per-token rate, "n/a" when no tokens of that kind were used.
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("${:.6}", r),
        None => "n/a".to_string(),
    }
}

/// Returns "18.4M" / "77.7K" / "950" for compact table cells.
pub fn format_tokens_compact(tokens: u64) -> String {
    match tokens {
        t if t >= 1_000_000_000 => format!("{:.1}B", t as f64 / 1e9),
        t if t >= 1_000_000 => format!("{:.1}M", t as f64 / 1e6),
        t if t >= 1_000 => format!("{:.1}K", t as f64 / 1e3),
        t => t.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_tokens_groups_thousands() {
        assert_eq!(format_tokens(0), "0");
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(1_000), "1,000");
        assert_eq!(format_tokens(18_429_385), "18,429,385");
    }

    #[test]
    fn format_token_delta_is_signed() {
        assert_eq!(format_token_delta(0), "+0");
        assert_eq!(format_token_delta(158_000), "+158,000");
        assert_eq!(format_token_delta(-1_234_567), "-1,234,567");
        assert_eq!(format_token_delta(i64::MIN), "-9,223,372,036,854,775,808");
    }

    #[test]
    fn format_usd_five_decimals() {
        assert_eq!(format_usd(1.2477), "$1.24770");
        assert_eq!(format_usd(0.0), "$0.00000");
        assert_eq!(format_usd_delta(0.5), "$+0.50000");
        assert_eq!(format_usd_delta(-0.0948), "$-0.09480");
    }

    #[test]
    fn format_rate_handles_missing() {
        assert_eq!(format_rate(None), "n/a");
        assert_eq!(format_rate(Some(0.0000006)), "$0.000001");
        assert_eq!(format_rate(Some(0.0025)), "$0.002500");
    }

    #[test]
    fn format_tokens_compact_units() {
        assert_eq!(format_tokens_compact(950), "950");
        assert_eq!(format_tokens_compact(77_666), "77.7K");
        assert_eq!(format_tokens_compact(18_429_385), "18.4M");
        assert_eq!(format_tokens_compact(2_500_000_000), "2.5B");
    }
}
