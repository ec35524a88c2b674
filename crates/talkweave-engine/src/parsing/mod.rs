//! The three parsing passes and their entry point.
//!
//! Data flows one way: discovery walk → tree builder → identifier assigner
//! → [`ThreadItemSet`]. Nothing downstream mutates the content tree or
//! feeds back into parsing; re-parsing is always a full rebuild.

pub mod builder;
pub mod discovery;
pub mod ids;
pub mod scan;
pub mod signature;
pub mod timestamp;

use crate::models::thread_item_set::ThreadItemSet;
use scraper::Html;
use std::sync::OnceLock;
use talkweave_locale::LocaleConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Pattern(#[from] timestamp::PatternError),

    #[error("at least one locale bundle is required")]
    NoLocales,

    /// The forward leaf-search ran dry while locating a comment boundary.
    /// This cannot happen on a well-formed tree; it means the tree-walk
    /// predicates and the tree shape have diverged.
    #[error("content walk exhausted while locating a comment boundary")]
    WalkExhausted,
}

/// Identity of the page being parsed, used only to resolve self-links
/// during signature detection.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Full page title, e.g. "User talk:Alice".
    pub title: String,
    /// The user the page is about, when it is a user (talk) page.
    pub subject_user: Option<String>,
}

impl PageContext {
    pub fn new(title: impl Into<String>) -> Self {
        PageContext {
            title: title.into(),
            subject_user: None,
        }
    }

    pub fn with_subject_user(mut self, user: impl Into<String>) -> Self {
        self.subject_user = Some(user.into());
        self
    }
}

/// The discussion-thread parser for one site: compiled timestamp matchers
/// for every locale variant plus the site's primary bundle.
///
/// Construction compiles every pattern once; parsing reuses them for each
/// candidate text node. The parser is read-only after construction and safe
/// to call from multiple sites as long as nobody mutates a tree mid-walk.
pub struct ThreadParser {
    site: LocaleConfig,
    registry: timestamp::TimestampRegistry,
}

impl ThreadParser {
    pub fn new(locales: &[LocaleConfig]) -> Result<Self, ParseError> {
        let site = locales.first().cloned().ok_or(ParseError::NoLocales)?;
        let registry = timestamp::TimestampRegistry::new(locales)?;
        Ok(ThreadParser { site, registry })
    }

    /// Reconstruct the thread structure of a rendered talk page.
    ///
    /// One discovery walk, one tree-building pass, one identifier pass;
    /// the content tree is never mutated. Recoverable anomalies end up in
    /// per-item warnings; the only fatal parse condition is a contract
    /// violation in the tree walk.
    pub fn parse(&self, doc: &Html, ctx: &PageContext) -> Result<ThreadItemSet, ParseError> {
        let mut items = discovery::discover(doc, &self.site, ctx, &self.registry)?;
        let threads = builder::build_tree(&mut items);
        ids::assign(&mut items);
        log::debug!(
            "parsed {} thread items ({} threads)",
            items.len(),
            threads.len()
        );
        Ok(ThreadItemSet::index(items, threads))
    }

    pub fn registry(&self) -> &timestamp::TimestampRegistry {
        &self.registry
    }
}

static GLOBAL_PARSER: OnceLock<ThreadParser> = OnceLock::new();

/// Install the process-wide parser, built once from the static locale
/// bundles at startup. Returns the already-installed parser on repeat calls.
pub fn install_global(parser: ThreadParser) -> &'static ThreadParser {
    GLOBAL_PARSER.get_or_init(|| parser)
}

/// The process-wide parser, when one has been installed.
pub fn global() -> Option<&'static ThreadParser> {
    GLOBAL_PARSER.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_locale_list_is_rejected() {
        let result = ThreadParser::new(&[]);
        assert!(matches!(result, Err(ParseError::NoLocales)));
    }

    #[test]
    fn test_parser_builds_from_english_bundle() {
        let parser = ThreadParser::new(&[LocaleConfig::english()]).unwrap();
        assert_eq!(parser.registry().matchers().len(), 1);
    }
}
