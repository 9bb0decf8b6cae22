/// Convert a 1-based column index to a spreadsheet column title.
///
/// This is not plain base-26: there is no zero digit, so the digit range is
/// 1..=26 (A..=Z). 1 -> "A", 26 -> "Z", 27 -> "AA", 703 -> "AAA".
pub fn to_title(mut index: u32) -> String {
    debug_assert!(index >= 1, "column indices are 1-based");

    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).expect("ASCII uppercase letters")
}

/// Inverse of [`to_title`]. Returns None for empty or non-uppercase input.
pub fn from_title(title: &str) -> Option<u32> {
    if title.is_empty() {
        return None;
    }

    let mut index: u32 = 0;
    for b in title.bytes() {
        if !b.is_ascii_uppercase() {
            return None;
        }
        index = index * 26 + (b - b'A' + 1) as u32;
    }
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_titles() {
        assert_eq!(to_title(1), "A");
        assert_eq!(to_title(26), "Z");
        assert_eq!(to_title(27), "AA");
        assert_eq!(to_title(52), "AZ");
        assert_eq!(to_title(53), "BA");
        assert_eq!(to_title(702), "ZZ");
        assert_eq!(to_title(703), "AAA");
    }

    #[test]
    fn round_trip() {
        for n in 1..=10_000 {
            assert_eq!(from_title(&to_title(n)), Some(n), "index {n}");
        }
    }

    #[test]
    fn from_title_rejects_garbage() {
        assert_eq!(from_title(""), None);
        assert_eq!(from_title("a"), None);
        assert_eq!(from_title("A1"), None);
    }
}
