//! Stable identifiers for entries, templates and the JSON-LD context.
//!
//! A resolver carries one [`IriStyle`]; every entry and template IRI it
//! builds for a document uses that style, so full URLs and compact `en.wt:`
//! forms never meet in the same output. The `@context` IRI is the exception:
//! it names the context document the prefixes are defined in, so it is
//! always a full URL.

use crate::case::normalize_word;
use crate::lang::language_heading;

pub const DEFAULT_CONTEXT_BASE: &str = "https://wiktionary.ld";

/// Which entry of which wiki: `wiki` is the edition (en.wiktionary.org),
/// `lang` the language section on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryQuery {
    pub wiki: String,
    pub lang: String,
    pub word: String,
}

impl EntryQuery {
    pub fn new(wiki: impl Into<String>, lang: impl Into<String>, word: impl Into<String>) -> Self {
        EntryQuery { wiki: wiki.into(), lang: lang.into(), word: word.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IriStyle {
    /// `https://en.wiktionary.org/wiki/cat#English`
    #[default]
    Full,
    /// `en.wt:cat#English`
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IriResolver {
    style: IriStyle,
    context_base: String,
}

impl Default for IriResolver {
    fn default() -> Self {
        IriResolver::new(IriStyle::default(), DEFAULT_CONTEXT_BASE)
    }
}

impl IriResolver {
    pub fn new(style: IriStyle, context_base: impl Into<String>) -> Self {
        IriResolver { style, context_base: context_base.into() }
    }

    fn wiki_base(&self, wiki: &str) -> String {
        match self.style {
            IriStyle::Full => format!("https://{wiki}.wiktionary.org/wiki/"),
            IriStyle::Compact => format!("{wiki}.wt:"),
        }
    }

    pub fn entry_iri(&self, wiki: &str, lang: &str, word: &str) -> String {
        let fragment = language_heading(lang).unwrap_or(lang);
        format!("{}{}#{}", self.wiki_base(wiki), page_name(word), fragment)
    }

    pub fn entry_iri_for(&self, query: &EntryQuery) -> String {
        self.entry_iri(&query.wiki, &query.lang, &query.word)
    }

    pub fn context_iri(&self) -> String {
        format!("{}/contexts/v1.json", self.context_base.trim_end_matches('/'))
    }

    /// IRI of a template page. `template` is the name as written in the
    /// markup (`en-noun`), which is also its page title.
    pub fn template_iri(&self, template: &str, wiki: &str) -> String {
        match self.style {
            IriStyle::Full => format!("{}Template:{}", self.wiki_base(wiki), page_name(template)),
            IriStyle::Compact => format!("{wiki}.wt.t:{}", page_name(template)),
        }
    }
}

/// Page titles use underscores for spaces in wiki URLs.
fn page_name(word: &str) -> String {
    normalize_word(word).replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_entry_iri() {
        let iri = IriResolver::default();
        assert_eq!(iri.entry_iri("en", "en", "cat"), "https://en.wiktionary.org/wiki/cat#English");
        assert_eq!(
            iri.entry_iri("en", "fr", "ice cream"),
            "https://en.wiktionary.org/wiki/ice_cream#French"
        );
    }

    #[test]
    fn compact_entry_iri() {
        let iri = IriResolver::new(IriStyle::Compact, DEFAULT_CONTEXT_BASE);
        assert_eq!(iri.entry_iri("en", "de", "Hund"), "en.wt:Hund#German");
    }

    #[test]
    fn unknown_language_uses_code() {
        let iri = IriResolver::default();
        assert_eq!(iri.entry_iri("en", "xx", "a"), "https://en.wiktionary.org/wiki/a#xx");
    }

    #[test]
    fn template_iris_follow_style() {
        let full = IriResolver::default();
        let compact = IriResolver::new(IriStyle::Compact, DEFAULT_CONTEXT_BASE);
        assert_eq!(
            full.template_iri("en-noun", "en"),
            "https://en.wiktionary.org/wiki/Template:en-noun"
        );
        assert_eq!(compact.template_iri("en-noun", "en"), "en.wt.t:en-noun");
        assert_eq!(compact.template_iri("plural of", "en"), "en.wt.t:plural_of");
    }

    #[test]
    fn context_iri_trims_slash() {
        let iri = IriResolver::new(IriStyle::Full, "https://example.org/");
        assert_eq!(iri.context_iri(), "https://example.org/contexts/v1.json");
    }

    #[test]
    fn deterministic_for_equivalent_words() {
        let iri = IriResolver::default();
        assert_eq!(
            iri.entry_iri("en", "fr", "cafe\u{0301}"),
            iri.entry_iri("en", "fr", "caf\u{00e9}")
        );
    }
}
