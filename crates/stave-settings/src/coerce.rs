//! Textual value coercion.

/// Parse a boolean setting: case-insensitive `yes` or `no`.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    if value.eq_ignore_ascii_case("yes") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("no") {
        Ok(false)
    } else {
        Err(format!("Invalid boolean: {value}"))
    }
}

/// Parse a non-negative integer setting.
///
/// Radix follows the C `%i` conversion: `0x`/`0X` is hexadecimal, a leading
/// `0` is octal (so `0600` works for umask-style values), anything else is
/// decimal. The whole value must be consumed.
pub fn parse_uint(value: &str) -> Result<u32, String> {
    let err = || format!("Invalid number: {value}");

    let digits = value.strip_prefix('+').unwrap_or(value);
    if digits.is_empty() || digits.starts_with('-') {
        return Err(err());
    }
    let (digits, radix) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (hex, 16)
    } else if digits != "0" && digits.starts_with('0') {
        (&digits[1..], 8)
    } else {
        (digits, 10)
    };
    u32::from_str_radix(digits, radix).map_err(|_| err())
}
