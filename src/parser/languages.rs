//! Supported languages and the process-wide Tree-sitter language cache.
//!
//! Rust is handled by the `syn` crate for faithful macro-aware parsing;
//! the remaining languages share Tree-sitter grammars.

use anyhow::Result;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tree_sitter::{Language, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceLanguage {
    /// Rust - handled by syn, not Tree-sitter
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
}

impl SourceLanguage {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "rs" => Some(Self::Rust),
            "py" | "pyw" => Some(Self::Python),
            "js" | "mjs" | "cjs" | "jsx" => Some(Self::JavaScript),
            "ts" | "tsx" | "mts" => Some(Self::TypeScript),
            "go" => Some(Self::Go),
            _ => None,
        }
    }

    pub fn tree_sitter_language(self) -> Result<Language> {
        match self {
            Self::Rust => anyhow::bail!("rust parsing uses syn, not tree-sitter"),
            Self::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Self::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Self::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Self::Go => Ok(tree_sitter_go::LANGUAGE.into()),
        }
    }

    /// Separator used when building qualified names for symbols defined in
    /// this language.
    pub fn scope_separator(self) -> &'static str {
        match self {
            Self::Rust => "::",
            _ => ".",
        }
    }
}

impl std::fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rust => write!(f, "Rust"),
            Self::Python => write!(f, "Python"),
            Self::JavaScript => write!(f, "JavaScript"),
            Self::TypeScript => write!(f, "TypeScript"),
            Self::Go => write!(f, "Go"),
        }
    }
}

// Tree-sitter Language objects are expensive to build and safe to share;
// one cache for the whole process.
lazy_static! {
    static ref LANGUAGE_CACHE: Arc<RwLock<HashMap<SourceLanguage, Language>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

pub struct LanguageCache;

impl LanguageCache {
    pub fn get_or_create(language: SourceLanguage) -> Result<Language> {
        {
            let cache = LANGUAGE_CACHE
                .read()
                .map_err(|e| anyhow::anyhow!("language cache read lock poisoned: {e}"))?;
            if let Some(lang) = cache.get(&language) {
                return Ok(lang.clone());
            }
        }

        let lang = language.tree_sitter_language()?;

        {
            let mut cache = LANGUAGE_CACHE
                .write()
                .map_err(|e| anyhow::anyhow!("language cache write lock poisoned: {e}"))?;
            cache.entry(language).or_insert_with(|| lang.clone());
        }

        Ok(lang)
    }

    /// Convenience: a parser already configured for `language`.
    pub fn parser_for(language: SourceLanguage) -> Result<Parser> {
        let lang = Self::get_or_create(language)?;
        let mut parser = Parser::new();
        parser
            .set_language(&lang)
            .map_err(|e| anyhow::anyhow!("failed to set parser language for {language}: {e}"))?;
        Ok(parser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping_covers_supported_set() {
        assert_eq!(SourceLanguage::from_extension("py"), Some(SourceLanguage::Python));
        assert_eq!(SourceLanguage::from_extension("tsx"), Some(SourceLanguage::TypeScript));
        assert_eq!(SourceLanguage::from_extension("rs"), Some(SourceLanguage::Rust));
        assert_eq!(SourceLanguage::from_extension("rb"), None);
    }

    #[test]
    fn rust_has_no_tree_sitter_grammar() {
        assert!(SourceLanguage::Rust.tree_sitter_language().is_err());
    }

    #[test]
    fn language_cache_returns_same_grammar() {
        let a = LanguageCache::get_or_create(SourceLanguage::Python).unwrap();
        let b = LanguageCache::get_or_create(SourceLanguage::Python).unwrap();
        // Clones of the same cached Language parse the same grammar version.
        assert_eq!(a.abi_version(), b.abi_version());
    }
}
