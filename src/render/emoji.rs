// Small static emoji corpus used by the composite generator (C6) for title
// and keyword+emoji synthesis. Embedded as a const slice, matching the
// "small static lookup table" pattern used for other enumerated data in this
// codebase.

pub const EMOJI_TABLE: &[char] = &[
    '😀', '😁', '😂', '🤣', '😊', '😍', '😎', '🤩', '🥳', '😇', '🙂', '😉', '😋', '😜', '🤗',
    '🤔', '🙌', '👏', '👍', '👌', '✨', '🔥', '💯', '⭐', '🌟', '💎', '🚀', '⚡', '🎯', '🏆',
    '🎉', '🎁', '📈', '💰', '💡', '🔔', '📌', '📍', '🗺', '🧭', '🛒', '🛍', '📦', '🚚', '⏰',
    '📅', '✅', '❗', '❓', '💬', '📣', '🔑', '🛡', '🧩', '🎨', '🍀', '🌈', '☀', '🌙', '🌊',
    '🌿', '🍎', '🍕', '☕', '🏠', '🚗', '✈', '🎵', '📷', '💻', '📱', '🖥', '🎮', '🧠', '❤',
    '💙', '💚', '💛', '💜', '🧡',
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_non_empty_and_distinct() {
        assert!(EMOJI_TABLE.len() > 10);
        let unique: std::collections::HashSet<_> = EMOJI_TABLE.iter().collect();
        assert_eq!(unique.len(), EMOJI_TABLE.len());
    }
}
