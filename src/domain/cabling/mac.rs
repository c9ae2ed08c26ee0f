/// Canonical form of a MAC address: separators (`:`, `-`, `.`) stripped and
/// lowercased. Switch vendors and BMCs disagree on the textual format.
pub fn normalize_mac(mac: &str) -> String {
    mac.chars().filter(|c| !matches!(c, ':' | '-' | '.')).flat_map(char::to_lowercase).collect()
}

pub fn macs_match(a: &str, b: &str) -> bool {
    let a = normalize_mac(a);
    !a.is_empty() && a == normalize_mac(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_and_cisco_dot_formats_are_equal() {
        assert!(macs_match("24:4a:97:9a:b7:6b", "244a.979a.b76b"));
        assert!(macs_match("24-4A-97-9A-B7-6B", "24:4a:97:9a:b7:6b"));
    }

    #[test]
    fn different_addresses_do_not_match() {
        assert!(!macs_match("24:4a:97:9a:b7:6b", "24:4a:97:9a:b7:6c"));
        assert!(!macs_match("", ""));
    }
}
