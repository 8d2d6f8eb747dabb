//! Utility functions for configkey

/// True when a value cannot be emitted verbatim in a text dump.
///
/// `\n` and `\t` survive JSON escaping; any other control byte, DEL, or a
/// byte with the high bit set marks the value as binary.
pub fn is_binary(value: &[u8]) -> bool {
    value
        .iter()
        .any(|&c| (c < 0x20 && c != b'\n' && c != b'\t') || c >= 0x7f)
}

/// Placeholder emitted instead of a binary value
pub fn binary_placeholder(len: usize) -> String {
    format!("<<< binary blob of length {} >>>", len)
}

/// Render a value for display: text as-is, binary as the placeholder.
pub fn printable_value(value: &[u8]) -> String {
    if is_binary(value) {
        binary_placeholder(value.len())
    } else {
        String::from_utf8_lossy(value).into_owned()
    }
}

/// Smallest key strictly greater than every key starting with `prefix`, if any.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
