//! Wikitext → section tree → semantic document.

use crate::error::{Diagnostic, Error, Result};
use crate::flatten::flatten;
use crate::iri::{EntryQuery, IriResolver};
use crate::lang::language_heading;
use crate::node::{Node, NodeMap};
use crate::section::{SectionTree, SectionTreeBuilder};
use crate::transform::TransformTable;
use serde::{Serialize, Serializer};

/// `@type` of every produced document.
pub const ENTRY_TYPE: &str = "od:Word";

/// One flattened entry: the `@id`/`@context`/`@type` envelope followed by
/// the predicates in order of first appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticDocument {
    pub id: String,
    pub context: String,
    pub predicates: NodeMap,
}

impl SemanticDocument {
    pub fn get(&self, predicate: &str) -> Option<&Node> {
        self.predicates.get(predicate)
    }

    pub fn to_map(&self) -> NodeMap {
        let mut map = NodeMap::new();
        map.insert("@id", Node::leaf(self.id.clone()));
        map.insert("@context", Node::leaf(self.context.clone()));
        map.insert("@type", Node::leaf(ENTRY_TYPE));
        for (k, v) in self.predicates.iter() {
            map.insert(k, v.clone());
        }
        map
    }
}

impl Serialize for SemanticDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub tree: SectionTree,
    pub document: SemanticDocument,
    pub diagnostics: Vec<Diagnostic>,
}

impl Extraction {
    /// False when the page had no section for the requested language.
    pub fn found(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::MissingLanguageSection { .. }))
    }

    pub fn unresolved(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_low_confidence()).count()
    }
}

/// Runs extractions against a borrowed transform table. Cheap to build, so
/// one per worker thread is fine.
#[derive(Debug, Clone)]
pub struct Extractor<'a> {
    table: &'a TransformTable,
    iri: IriResolver,
}

impl<'a> Extractor<'a> {
    pub fn new(table: &'a TransformTable, iri: IriResolver) -> Self {
        Extractor { table, iri }
    }

    pub fn extract(&self, query: &EntryQuery, wikitext: &str) -> Result<Extraction> {
        let heading = language_heading(&query.lang)
            .ok_or_else(|| Error::UnknownLanguage(query.lang.clone()))?;

        let builder = SectionTreeBuilder::new(self.table, &self.iri, &query.wiki);
        let (tree, diagnostics) = builder.build(heading, wikitext);

        let document = SemanticDocument {
            id: self.iri.entry_iri_for(query),
            context: self.iri.context_iri(),
            predicates: flatten(&tree.to_node()),
        };

        Ok(Extraction { tree, document, diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iri::IriStyle;
    use serde_json::json;

    const RULES: &str = r#"
- _id: derived
  _match: [der]
  2: lang
  3: srcLang
  4: src
- _id: nounHeadword
  _match: [en-noun]
"#;

    fn extract(query: &EntryQuery, text: &str) -> Result<Extraction> {
        let table = TransformTable::from_yaml_str(RULES).unwrap();
        let iri = IriResolver::new(IriStyle::Full, "https://example.org");
        let extractor = Extractor::new(&table, iri);
        extractor.extract(query, text)
    }

    #[test]
    fn envelope_comes_first() {
        let query = EntryQuery::new("en", "en", "foo");
        let out = extract(&query, "==English==\n===Etymology===\nFrom {{der|en|la|foo}}.").unwrap();
        let text = serde_json::to_string(&out.document).unwrap();
        assert!(text.starts_with(concat!(
            r#"{"@id":"https://en.wiktionary.org/wiki/foo#English","#,
            r#""@context":"https://example.org/contexts/v1.json","#,
            r#""@type":"od:Word""#
        )));
        assert_eq!(
            serde_json::to_value(&out.document).unwrap()["derived"],
            json!({"lang": "en", "srcLang": "la", "src": "foo", "ctx": "etymology"})
        );
    }

    #[test]
    fn missing_section_is_envelope_only() {
        let query = EntryQuery::new("en", "fr", "foo");
        let out = extract(&query, "==English==\n{{en-noun}}").unwrap();
        assert!(!out.found());
        assert!(out.tree.is_empty());
        assert_eq!(
            serde_json::to_value(&out.document).unwrap(),
            json!({
                "@id": "https://en.wiktionary.org/wiki/foo#French",
                "@context": "https://example.org/contexts/v1.json",
                "@type": "od:Word"
            })
        );
    }

    #[test]
    fn unknown_language_is_an_error() {
        let query = EntryQuery::new("en", "zz", "foo");
        assert!(matches!(extract(&query, "").unwrap_err(), Error::UnknownLanguage(_)));
    }

    #[test]
    fn unresolved_counted() {
        let query = EntryQuery::new("en", "en", "foo");
        let out = extract(&query, "==English==\n{{mystery}} {{en-noun}}").unwrap();
        assert!(out.found());
        assert_eq!(out.unresolved(), 1);
        // Full-style IRI used as the pass-through identity.
        assert!(out.document.get("https://en.wiktionary.org/wiki/Template:mystery").is_some());
        assert_eq!(out.document.get("nounHeadword"), Some(&Node::Flag));
    }
}
