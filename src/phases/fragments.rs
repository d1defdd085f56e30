// Sentence fragment splitting for accepted label text

/// Fragment separator
pub const SENTENCE_TERMINATOR: char = '.';

/// Split on `.` keeping fragments longer than one character.
///
/// Fragments are not trimmed, so `" F"` survives while `"F"` and `"\n"` do not.
pub fn split_fragments(text: &str) -> Vec<String> {
    text.split(SENTENCE_TERMINATOR)
        .filter(|fragment| fragment.chars().count() > 1)
        .map(str::to_string)
        .collect()
}
