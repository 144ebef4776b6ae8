pub const ELLIPSIS: &str = "...";

pub fn truncate_label(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((byte_index, _)) => format!("{}{ELLIPSIS}", &text[..byte_index]),
        None => text.to_owned(),
    }
}

pub fn format_percent(value: f32) -> String {
    format!("{}%", value.clamp(0.0, 100.0).round() as u32)
}

pub fn format_requests(count: u64) -> String {
    if count == 1 {
        "1 request".to_owned()
    } else {
        format!("{count} requests")
    }
}

pub fn encode_component(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

pub fn decode_component(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' {
            let hex = encoded.get(index + 1..index + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            index += 3;
        } else {
            decoded.push(bytes[index]);
            index += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_label_keeps_short_text() {
        assert_eq!(truncate_label("Export", 30), "Export");
        assert_eq!(truncate_label("exactly", 7), "exactly");
    }

    #[test]
    fn truncate_label_cuts_on_char_boundaries() {
        assert_eq!(truncate_label("Dark mode support", 4), "Dark...");
        assert_eq!(truncate_label("ñandú über alles", 5), "ñandú...");
    }

    #[test]
    fn percent_is_rounded_and_clamped() {
        assert_eq!(format_percent(66.6), "67%");
        assert_eq!(format_percent(140.0), "100%");
        assert_eq!(format_percent(-3.0), "0%");
    }

    #[test]
    fn components_survive_encoding() {
        let raw = "ctx/42 ünïcode?";
        let encoded = encode_component(raw);
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains(' '));
        assert_eq!(decode_component(&encoded).as_deref(), Some(raw));
    }

    #[test]
    fn decode_rejects_truncated_escape() {
        assert_eq!(decode_component("abc%4"), None);
    }
}
