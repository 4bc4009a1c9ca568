// ============================================================
// Layer 4 - Parallel Text Loader
// ============================================================
// Reads a raw parallel corpus laid out as
//
//   <data>/train.de   <data>/train.en
//   <data>/valid.de   <data>/valid.en
//   <data>/test.de    <data>/test.en
//
// one sentence per line, line N of the source file aligned with
// line N of the target file. Lines are cleaned, looked up in the
// per-language vocabulary and terminated with EOS.
//
// Pairs where either side is empty after cleaning are dropped;
// a line-count mismatch between the two files is an error.

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::data::preprocessor::Preprocessor;
use crate::domain::{error::ConfigError, sentence_pair::SentencePair, traits::CorpusSource};
use crate::infra::tokenizer_store::Vocabulary;

/// Path of one side of a split: `<dir>/<split>.<lang>`
pub fn split_path(dir: &Path, split: &str, lang: &str) -> PathBuf {
    dir.join(format!("{split}.{lang}"))
}

/// Read and clean every line of `<dir>/<split>.<lang>`.
/// A missing file is reported as ConfigError::MissingSplit.
pub fn read_lines(dir: &Path, split: &str, lang: &str, preprocessor: &Preprocessor) -> Result<Vec<String>> {
    let path = split_path(dir, split, lang);
    if !path.is_file() {
        return Err(ConfigError::MissingSplit {
            split: split.to_string(),
            lang:  lang.to_string(),
            path:  path.display().to_string(),
        }
        .into());
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    Ok(text.lines().map(|l| preprocessor.clean_line(l)).collect())
}

/// Implements CorpusSource over raw text files.
pub struct RawTextLoader {
    dir:          PathBuf,
    src_lang:     String,
    trg_lang:     String,
    src_vocab:    Vocabulary,
    trg_vocab:    Vocabulary,
    preprocessor: Preprocessor,
}

impl RawTextLoader {
    pub fn new(
        dir:          impl Into<PathBuf>,
        src_lang:     impl Into<String>,
        trg_lang:     impl Into<String>,
        src_vocab:    Vocabulary,
        trg_vocab:    Vocabulary,
        preprocessor: Preprocessor,
    ) -> Self {
        Self {
            dir: dir.into(),
            src_lang: src_lang.into(),
            trg_lang: trg_lang.into(),
            src_vocab,
            trg_vocab,
            preprocessor,
        }
    }

    pub fn trg_vocab(&self) -> &Vocabulary {
        &self.trg_vocab
    }
}

impl CorpusSource for RawTextLoader {
    fn load_split(&self, split: &str) -> Result<Vec<SentencePair>> {
        let sources = read_lines(&self.dir, split, &self.src_lang, &self.preprocessor)?;
        let targets = read_lines(&self.dir, split, &self.trg_lang, &self.preprocessor)?;

        if sources.len() != targets.len() {
            anyhow::bail!(
                "Split '{}' is not aligned: {} {} lines vs {} {} lines",
                split, sources.len(), self.src_lang, targets.len(), self.trg_lang
            );
        }

        let mut pairs = Vec::with_capacity(sources.len());
        let mut dropped = 0usize;
        for (line, (src, trg)) in sources.iter().zip(&targets).enumerate() {
            if src.is_empty() || trg.is_empty() {
                dropped += 1;
                continue;
            }
            pairs.push(SentencePair::new(
                line,
                self.src_vocab.encode(src)?,
                self.trg_vocab.encode(trg)?,
            ));
        }

        if dropped > 0 {
            tracing::warn!("Split '{}': dropped {} pairs with an empty side", split, dropped);
        }
        tracing::info!("Loaded split '{}' with {} pairs", split, pairs.len());
        Ok(pairs)
    }
}
