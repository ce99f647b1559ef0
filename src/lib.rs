//! Wiktionary wikitext to JSON-LD shaped lexical documents.
//!
//! The pipeline runs in four stages:
//!
//! 1. [`scan`] pulls `{{template}}` and `[[link]]` tokens out of each line
//!    ([`template`], [`wikilink`]).
//! 2. [`transform`] rewrites raw templates into a shared vocabulary using a
//!    declarative YAML rule table.
//! 3. [`section`] arranges the rewritten records under the page's heading
//!    outline for one language.
//! 4. [`flatten`] folds the tree into a predicate-keyed document, wrapped in
//!    an `@id`/`@context` envelope by [`pipeline`].
//!
//! ```no_run
//! use wiktionary_ld::{EntryQuery, Extractor, IriResolver, TableCache};
//!
//! let cache = TableCache::new("schema/transforms.yaml");
//! let extractor = Extractor::new(cache.get()?, IriResolver::default());
//! let out = extractor.extract(&EntryQuery::new("en", "en", "cat"), "==English==\n{{en-noun}}")?;
//! println!("{}", serde_json::to_string(&out.document)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod case;
pub mod error;
pub mod flatten;
pub mod iri;
pub mod lang;
pub mod node;
pub mod parallel;
pub mod pipeline;
pub mod scan;
pub mod section;
pub mod source;
pub mod template;
pub mod transform;
pub mod wikilink;

pub use error::{Diagnostic, Error, Result};
pub use flatten::flatten;
pub use iri::{EntryQuery, IriResolver, IriStyle};
pub use node::{Node, NodeMap};
pub use pipeline::{Extraction, Extractor, SemanticDocument};
pub use section::SectionTree;
pub use template::{parse_template, RawTemplate};
pub use transform::{TableCache, TransformTable};
pub use wikilink::{parse_wikilink, WikiLink};
