//! Helpers for WhatsApp chat identifiers (JIDs).

pub const USER_SERVER: &str = "s.whatsapp.net";
pub const GROUP_SERVER: &str = "g.us";
pub const STATUS_BROADCAST: &str = "status@broadcast";

pub fn is_group(jid: &str) -> bool {
    jid.split_once('@').is_some_and(|(_, server)| server == GROUP_SERVER)
}

pub fn is_status(jid: &str) -> bool {
    jid == STATUS_BROADCAST
}

/// Strip the device suffix (`628123:12@s.whatsapp.net` -> `628123@s.whatsapp.net`).
pub fn normalize(jid: &str) -> String {
    match jid.split_once('@') {
        Some((user, server)) => {
            let user = user.split(':').next().unwrap_or(user);
            format!("{}@{}", user, server)
        }
        None => jid.to_string(),
    }
}

/// The user part of a JID, without device suffix.
pub fn user_part(jid: &str) -> &str {
    let user = jid.split('@').next().unwrap_or(jid);
    user.split(':').next().unwrap_or(user)
}

pub fn same_user(a: &str, b: &str) -> bool {
    user_part(a) == user_part(b)
}

/// Parse a phone-number-like argument (`+62 812-3456`, `@628123456`) into a user JID.
///
/// Returns `None` when the input does not look like a phone number.
pub fn from_phone(input: &str) -> Option<String> {
    let trimmed = input.trim().trim_start_matches('@');
    if trimmed.contains('@') {
        return None;
    }
    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'))
        .collect();
    if digits.len() < 5 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}@{}", digits, USER_SERVER))
}

/// `@628123` style mention token for message text.
pub fn mention_tag(jid: &str) -> String {
    format!("@{}", user_part(jid))
}
