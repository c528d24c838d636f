//! String formatting helpers for hex identifiers and log output.

/// Shortens an identifier for log fields, keeping the first 10 characters
/// (enough for `0x` plus 8 hex digits).
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Adds a `0x` prefix unless one is already present (either case).
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.starts_with("0x") || hex_str.starts_with("0X") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Strips a leading `0x`/`0X`.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Renders bytes as lowercase `0x` hex.
pub fn hex_string(bytes: &[u8]) -> String {
	format!("0x{}", hex::encode(bytes))
}
