//! Heading outline → nested section tree.
//!
//! Only the span under `==<Language>==` is read. Inside it, `===Name===`
//! headings open sections one level below the language, `====Name====` two
//! levels, and so on. Templates and links found on ordinary lines are
//! collected in order and stored in the `preface` of whichever section is
//! open when the next heading (or the end of the span) arrives.

use crate::case::camel_case;
use crate::error::Diagnostic;
use crate::iri::IriResolver;
use crate::node::{Node, NodeMap, TEMPLATE_KEY};
use crate::scan::{scan_line, Token};
use crate::transform::{pass_through, TransformTable};
use crate::wikilink::WikiLink;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

lazy_static! {
    // A `==Language==` line: the end of the span being read.
    static ref LANGUAGE_HEADING: Regex = Regex::new(r"^==[^=\s](?:.*[^=\s])?==$").unwrap();
}

pub const PREFACE_KEY: &str = "preface";

/// Identity given to link records.
pub const WIKILINK_TEMPLATE: &str = "wikilink";

/// Identity given to templates whose first segment is a `key=value` pair.
pub const ANONYMOUS_TEMPLATE: &str = "template";

pub type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionNode {
    pub preface: Vec<Node>,
    children: Vec<(String, NodeId)>,
}

impl SectionNode {
    pub fn children(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.children.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

/// Arena of sections; index 0 is the language section itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionTree {
    nodes: Vec<SectionNode>,
}

impl Default for SectionTree {
    fn default() -> Self {
        SectionTree { nodes: vec![SectionNode::default()] }
    }
}

impl SectionTree {
    pub fn root(&self) -> &SectionNode {
        &self.nodes[ROOT]
    }

    pub fn node(&self, id: NodeId) -> Option<&SectionNode> {
        self.nodes.get(id)
    }

    /// Section at a path of camel-cased names; the empty path is the root.
    pub fn get(&self, path: &[&str]) -> Option<&SectionNode> {
        let mut node = self.root();
        for name in path {
            let (_, id) = node.children().find(|(n, _)| n == name)?;
            node = self.node(id)?;
        }
        Some(node)
    }

    pub fn is_empty(&self) -> bool {
        let root = self.root();
        root.preface.is_empty() && root.children.is_empty()
    }

    /// Add (or replace) the child `name` of `parent`. A replaced sibling is
    /// left unreachable in the arena.
    fn add_child(&mut self, parent: NodeId, name: String) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(SectionNode::default());
        let children = &mut self.nodes[parent].children;
        match children.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = id,
            None => children.push((name, id)),
        }
        id
    }

    fn flush(&mut self, at: NodeId, buffer: &mut Vec<Node>) {
        self.nodes[at].preface.append(buffer);
    }

    /// `{ "preface": [...], "<child>": { ... }, ... }`
    pub fn to_node(&self) -> Node {
        self.node_at(ROOT)
    }

    fn node_at(&self, id: NodeId) -> Node {
        let section = &self.nodes[id];
        let mut map = NodeMap::new();
        map.insert(PREFACE_KEY, Node::List(section.preface.clone()));
        for (name, child) in section.children() {
            map.insert(name, self.node_at(child));
        }
        Node::Object(map)
    }
}

impl Serialize for SectionTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_node().serialize(serializer)
    }
}

/// `(depth, name)` for a heading line. Depth is the `=` run length minus
/// two; both runs must be the same length.
pub fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let lead = line.len() - line.trim_start_matches('=').len();
    let trail = line.len() - line.trim_end_matches('=').len();
    if lead < 2 || lead != trail || lead + trail >= line.len() {
        return None;
    }
    let name = line[lead..line.len() - trail].trim();
    if name.is_empty() {
        return None;
    }
    Some((lead - 2, name))
}

fn section_key(name: &str) -> String {
    let key = camel_case(name);
    match key.as_str() {
        "" => name.to_string(),
        PREFACE_KEY => format!("{PREFACE_KEY}Section"),
        _ => key,
    }
}

pub fn link_node(link: WikiLink) -> Node {
    let mut map = NodeMap::new();
    map.insert(TEMPLATE_KEY, Node::leaf(WIKILINK_TEMPLATE));
    map.insert("link", Node::Leaf(link.link));
    map.insert("extra", Node::List(link.extra.into_iter().map(Node::Leaf).collect()));
    Node::Object(map)
}

struct Frame {
    depth: usize,
    node: NodeId,
}

/// Builds section trees against one transform table.
pub struct SectionTreeBuilder<'a> {
    table: &'a TransformTable,
    iri: &'a IriResolver,
    wiki: &'a str,
}

impl<'a> SectionTreeBuilder<'a> {
    pub fn new(table: &'a TransformTable, iri: &'a IriResolver, wiki: &'a str) -> Self {
        SectionTreeBuilder { table, iri, wiki }
    }

    /// Build the tree for the `==<heading>==` section of `wikitext`. A page
    /// without that section yields an empty tree and a
    /// [`Diagnostic::MissingLanguageSection`].
    pub fn build(&self, heading: &str, wikitext: &str) -> (SectionTree, Vec<Diagnostic>) {
        let mut tree = SectionTree::default();
        let mut diagnostics = Vec::new();

        let start = format!("=={heading}==");
        let mut lines = wikitext.lines().enumerate();
        if !lines.by_ref().any(|(_, line)| line == start) {
            debug!(heading, "language section not found");
            diagnostics.push(Diagnostic::MissingLanguageSection { heading: heading.to_string() });
            return (tree, diagnostics);
        }

        let mut stack = vec![Frame { depth: 0, node: ROOT }];
        let mut buffer = Vec::new();

        for (idx, line) in lines {
            if LANGUAGE_HEADING.is_match(line) {
                break;
            }

            if let Some((depth, name)) = parse_heading(line).filter(|(d, _)| *d >= 1) {
                let current = stack.last().map_or(ROOT, |f| f.node);
                tree.flush(current, &mut buffer);

                while stack.last().is_some_and(|f| f.depth >= depth) {
                    stack.pop();
                }
                let parent = stack.last().map_or(ROOT, |f| f.node);
                let node = tree.add_child(parent, section_key(name));
                stack.push(Frame { depth, node });
                continue;
            }

            self.collect_items(idx + 1, line, &mut buffer, &mut diagnostics);
        }

        let current = stack.last().map_or(ROOT, |f| f.node);
        tree.flush(current, &mut buffer);

        (tree, diagnostics)
    }

    fn collect_items(
        &self,
        line_no: usize,
        line: &str,
        buffer: &mut Vec<Node>,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let scan = scan_line(line);

        for fragment in scan.malformed {
            debug!(line = line_no, fragment = %fragment, "dropping unclosed markup");
            diagnostics.push(Diagnostic::MalformedToken { line: line_no, fragment });
        }

        for token in scan.tokens {
            let node = match token {
                Token::Link(link) => link_node(link),
                Token::Template(raw) => {
                    let record = match raw.id() {
                        Some(id) => match self.table.resolve(id) {
                            Some(rule) => rule.apply(&raw),
                            None => {
                                let name = raw.name().unwrap_or(id);
                                let iri = self.iri.template_iri(name, self.wiki);
                                warn!(
                                    template = id,
                                    line = line_no,
                                    "no transform rule, passing through"
                                );
                                diagnostics.push(Diagnostic::UnresolvedTemplate {
                                    id: id.to_string(),
                                    iri: iri.clone(),
                                });
                                pass_through(&raw, &iri)
                            }
                        },
                        None => {
                            warn!(line = line_no, "template without a name, passing through");
                            diagnostics.push(Diagnostic::AnonymousTemplate { line: line_no });
                            pass_through(&raw, ANONYMOUS_TEMPLATE)
                        }
                    };
                    Node::Object(record)
                }
            };
            buffer.push(node);
        }
    }
}
