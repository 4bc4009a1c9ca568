// ============================================================
// Layer 4 - Sentence Preprocessor
// ============================================================
// Cleans one line of a parallel corpus before it reaches the
// word-level vocabulary.
//
// Corpora collected from the web carry invisible characters
// (non-breaking and zero-width spaces, byte order marks, stray
// control codes) that a whitespace tokenizer would otherwise
// turn into distinct, useless vocabulary entries.
//
// Cleaning steps (applied in order):
//   1. Map Unicode whitespace variants and control chars to a space
//   2. Collapse runs of spaces into one
//   3. Trim both ends
//
// Reference: Rust Book §8 (Strings in Rust)

pub struct Preprocessor {
    lowercase: bool,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self { lowercase: false }
    }

    /// Fold every line to lowercase before tokenisation
    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    /// Clean a single corpus line. Newlines inside the line are
    /// treated as spaces: one line is one sentence.
    pub fn clean_line(&self, line: &str) -> String {
        let mut out        = String::with_capacity(line.len());
        let mut last_space = true;

        for c in line.chars() {
            let c = match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() || c.is_whitespace() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        let trimmed = out.trim_end();
        if self.lowercase {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean_line("hello   world"), "hello world");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean_line("  hello world \r"), "hello world");
    }

    #[test]
    fn test_removes_invisible_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean_line("das\u{00A0}Haus\u{200B}ist\x01rot"), "das Haus ist rot");
    }

    #[test]
    fn test_lowercase_option() {
        let p = Preprocessor::new().with_lowercase(true);
        assert_eq!(p.clean_line("Das Haus"), "das haus");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean_line(""), "");
    }
}
