/// Lowercase, turn everything but ascii letters, digits and whitespace into
/// spaces, then split on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_case_are_dropped() {
        assert_eq!(tokenize("Hello, World! It's 2024."), vec!["hello", "world", "it", "s", "2024"]);
        assert!(tokenize("  ...  ").is_empty());
        assert_eq!(tokenize("Über café"), vec!["ber", "caf"]);
    }
}
