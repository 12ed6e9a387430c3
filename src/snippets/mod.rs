use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::from_str;
use std::collections::HashMap;

use crate::language::PracticeLanguage;

static SNIPPET_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/snippets/data");

#[derive(Debug, thiserror::Error)]
pub enum SnippetError {
    #[error("snippet pool {0} not found")]
    Missing(String),
    #[error("snippet pool {0} is not valid utf-8")]
    Encoding(String),
    #[error("snippet pool {name} could not be parsed: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("snippet pool {0} is empty")]
    Empty(String),
    #[error("custom snippet is empty")]
    BlankCustom,
}

/// A fixed set of snippets for one language, as stored on disk
#[allow(dead_code)]
#[derive(Deserialize, Clone, Debug)]
pub struct SnippetPool {
    pub name: String,
    pub size: u32,
    pub snippets: Vec<String>,
}

impl SnippetPool {
    pub fn load(language: PracticeLanguage) -> Result<Self, SnippetError> {
        let file_name = format!("{language}.json");
        let file = SNIPPET_DIR
            .get_file(&file_name)
            .ok_or_else(|| SnippetError::Missing(file_name.clone()))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| SnippetError::Encoding(file_name.clone()))?;
        let pool: SnippetPool = from_str(contents).map_err(|source| SnippetError::Parse {
            name: file_name.clone(),
            source,
        })?;

        if pool.snippets.iter().all(|s| s.is_empty()) {
            return Err(SnippetError::Empty(file_name));
        }

        Ok(pool)
    }
}

/// Supplies snippets to type for a given language
pub trait SnippetSource {
    /// Uniformly random entry from the pool
    fn random(&self, language: PracticeLanguage) -> String;
    /// Deterministic first entry, used on first load
    fn initial(&self, language: PracticeLanguage) -> String;
}

/// The snippet pools compiled into the binary
#[derive(Debug, Clone)]
pub struct BuiltinSnippets {
    pools: HashMap<PracticeLanguage, Vec<String>>,
}

impl BuiltinSnippets {
    pub fn new() -> Result<Self, SnippetError> {
        let mut pools = HashMap::new();
        for language in PracticeLanguage::ALL {
            let pool = SnippetPool::load(language)?;
            let snippets = pool
                .snippets
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| normalize_line_endings(s))
                .collect();
            pools.insert(language, snippets);
        }
        Ok(Self { pools })
    }

    pub fn snippets(&self, language: PracticeLanguage) -> &[String] {
        self.pools.get(&language).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl SnippetSource for BuiltinSnippets {
    fn random(&self, language: PracticeLanguage) -> String {
        self.snippets(language)
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default()
    }

    fn initial(&self, language: PracticeLanguage) -> String {
        self.snippets(language).first().cloned().unwrap_or_default()
    }
}

/// A single user-supplied snippet, returned for every language
#[derive(Debug, Clone)]
pub struct FixedSnippet {
    text: String,
}

impl FixedSnippet {
    /// Rejects text with nothing to type
    pub fn new(text: &str) -> Result<Self, SnippetError> {
        let text = normalize_line_endings(text);
        if text.is_empty() {
            return Err(SnippetError::BlankCustom);
        }
        Ok(Self { text })
    }
}

impl SnippetSource for FixedSnippet {
    fn random(&self, _language: PracticeLanguage) -> String {
        self.text.clone()
    }

    fn initial(&self, _language: PracticeLanguage) -> String {
        self.text.clone()
    }
}

/// Collapse `\r\n` and lone `\r` into `\n` so one keystroke maps to one index
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}
