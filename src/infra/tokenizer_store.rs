// ============================================================
// Layer 6 - Vocabulary Store
// ============================================================
// One word-level vocabulary per language, persisted as a
// HuggingFace tokenizer JSON (src_vocab.json / trg_vocab.json in
// the run directory) so `translate` decodes with the exact ids the
// model was trained on.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper, so the JSON is written by hand and loaded
// back with Tokenizer::from_file.
//
// Reserved ids, shared by every vocabulary:
//   0  <pad>
//   1  </s>   (EOS; also the decoder's start symbol)
//   2  <unk>

use anyhow::{Context, Result};
use std::{collections::HashMap, path::Path};
use tokenizers::Tokenizer;

pub const PAD_ID: u32 = 0;
pub const EOS_ID: u32 = 1;
pub const UNK_ID: u32 = 2;

const SPECIALS: [&str; 3] = ["<pad>", "</s>", "<unk>"];

pub struct Vocabulary {
    tokenizer: Tokenizer,
}

impl Vocabulary {
    /// Load a vocabulary previously written by `build`
    pub fn load(path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Cannot load vocabulary from '{}': {}", path.display(), e))?;
        Ok(Self { tokenizer })
    }

    /// Count whitespace-separated words in `lines`, keep the
    /// `max_words` most frequent (0 = no limit), write the tokenizer
    /// JSON to `path` and load it back.
    pub fn build(lines: &[String], max_words: usize, path: &Path) -> Result<Self> {
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for line in lines {
            for word in line.split_whitespace() {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        // Frequency descending, ties alphabetical: ids are reproducible
        let mut words: Vec<(&str, usize)> = freq
            .into_iter()
            .filter(|(w, _)| !SPECIALS.contains(w))
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        if max_words > 0 {
            words.truncate(max_words);
        }

        let mut vocab = serde_json::Map::new();
        for (id, special) in SPECIALS.iter().enumerate() {
            vocab.insert(special.to_string(), serde_json::json!(id));
        }
        for (offset, (word, _)) in words.iter().enumerate() {
            vocab.insert(word.to_string(), serde_json::json!(SPECIALS.len() + offset));
        }

        let added_tokens: Vec<serde_json::Value> = SPECIALS
            .iter()
            .enumerate()
            .map(|(id, content)| serde_json::json!({
                "id": id, "content": content, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "<unk>"
            }
        });

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write vocabulary '{}'", path.display()))?;

        tracing::info!(
            "Vocabulary built with {} entries, saved to '{}'",
            SPECIALS.len() + words.len(),
            path.display()
        );
        Self::load(path)
    }

    /// Number of ids including the reserved ones, which are part of
    /// the word-level model's own vocabulary
    pub fn len(&self) -> usize {
        self.tokenizer.get_vocab_size(false)
    }

    /// Word ids of a cleaned line, EOS appended
    pub fn encode(&self, line: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(line, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation failed: {e}"))?;
        let mut ids = encoding.get_ids().to_vec();
        ids.push(EOS_ID);
        Ok(ids)
    }

    /// Words up to the first EOS, padding dropped
    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter()
            .take_while(|&&id| id != EOS_ID)
            .filter(|&&id| id != PAD_ID)
            .map(|&id| self.tokenizer.id_to_token(id).unwrap_or_else(|| SPECIALS[UNK_ID as usize].to_string()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reserved_ids_and_frequency_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src_vocab.json");
        let vocab = Vocabulary::build(&lines(&["a b a", "c"]), 0, &path).unwrap();

        assert_eq!(vocab.len(), 6);
        // "a" is most frequent, then b/c alphabetically; "z" is unknown
        assert_eq!(vocab.encode("a c z").unwrap(), vec![3, 5, UNK_ID, EOS_ID]);
        assert_eq!(vocab.decode(&[3, 5, EOS_ID, PAD_ID, 4]), "a c");
    }

    #[test]
    fn test_max_words_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trg_vocab.json");
        Vocabulary::build(&lines(&["x x y z"]), 1, &path).unwrap();

        let reloaded = Vocabulary::load(&path).unwrap();
        assert_eq!(reloaded.len(), 4);
        assert_eq!(reloaded.encode("x y").unwrap(), vec![3, UNK_ID, EOS_ID]);
    }
}
