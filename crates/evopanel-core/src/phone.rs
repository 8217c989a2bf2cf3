//! Phone number normalization for contacts and instances.

/// Keep only ASCII digits. Returns `None` when nothing is left.
pub fn digits_only(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Reduce a WhatsApp jid (`5511...@s.whatsapp.net`) to its digits.
pub fn phone_from_jid(jid: &str) -> Option<String> {
    let local = jid.split('@').next().unwrap_or(jid);
    digits_only(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("+55 (11) 99999-0000").as_deref(), Some("5511999990000"));
        assert_eq!(digits_only("abc"), None);
        assert_eq!(digits_only(""), None);
    }

    #[test]
    fn test_phone_from_jid() {
        assert_eq!(
            phone_from_jid("5511999990000@s.whatsapp.net").as_deref(),
            Some("5511999990000")
        );
        assert_eq!(phone_from_jid("5511999990000").as_deref(), Some("5511999990000"));
        assert_eq!(phone_from_jid("@lid"), None);
    }
}
