/// Money is represented as integer minor units (cents) to avoid floating-point precision issues.
/// For EUR/USD, 1 unit = 100 cents, so €50.00 = 5000 cents.
pub type Cents = i64;

/// Format cents as a human-readable currency string.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    let units = abs_cents / 100;
    let remainder = abs_cents % 100;
    format!("{}{}.{:02}", sign, units, remainder)
}
