//! Deterministic identifiers for every row the pass emits.

/// Shortest round-trip rendering of an offset, always with a fractional
/// part: `0.0`, `16.0`, `2.5`.
pub fn format_offset(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

/// Identifier prefix shared by every row of one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPrefix(String);

impl IdPrefix {
    /// First two characters of each artist word followed by the title
    /// without spaces or vowels, all lowercased.
    pub fn new(artist: &str, title: &str) -> Self {
        let mut prefix: String = artist
            .to_lowercase()
            .split_whitespace()
            .flat_map(|word| word.chars().take(2))
            .collect();
        prefix.extend(
            title
                .to_lowercase()
                .chars()
                .filter(|c| !matches!(c, ' ' | 'a' | 'e' | 'i' | 'o' | 'u')),
        );
        Self(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn track(&self) -> String {
        format!("{}-track", self.0)
    }

    pub fn section(&self, name: &str, start: f64) -> String {
        format!(
            "{}-sec-{}-{}",
            self.0,
            squash(name),
            format_offset(start)
        )
    }

    /// `index` is zero-based over the whole track.
    pub fn melodic_phrase(&self, index: usize, start: f64) -> String {
        format!("{}-mp{}-{}", self.0, index + 1, format_offset(start))
    }

    pub fn harmonic_phrase(&self, index: usize, start: f64) -> String {
        format!("{}-hp{}-{}", self.0, index + 1, format_offset(start))
    }

    pub fn note(&self, name: &str, offset: f64) -> String {
        format!("{}-{}-{}", self.0, name.to_lowercase(), format_offset(offset))
    }

    pub fn chord(&self, figure: &str, offset: f64) -> String {
        format!("{}-chord-{}-{}", self.0, squash(figure), format_offset(offset))
    }
}

fn squash(text: &str) -> String {
    text.to_lowercase().replace(' ', "")
}
