//! Declarative template normalization.
//!
//! A transform source is a YAML list of rules:
//!
//! ```yaml
//! - _id: derived
//!   _match: [der, derived]
//!   _extends: [common]
//!   2: lang
//!   3: srcLang
//!   4: src
//! - _id: synonyms
//!   _match: [syn, synonyms]
//!   2: lang
//!   '^(\d+)$': 'synonyms.\1-3.word'
//! ```
//!
//! `_id`, `_match`, `_extends`, `_ignore` and `_extra` are metadata. Every
//! other key maps a source key (a literal or, when it holds regex syntax, a
//! pattern) to a dot-delimited destination path. `\1-N` in a destination is
//! replaced by the pattern's first captured number minus N, so
//! `'^q(\d+)$': 'synonyms.\1-1.qualifier'` files `q2` under the second item.

use crate::case::snake_case;
use crate::error::{Error, Result};
use crate::node::{Node, NodeMap, TEMPLATE_KEY};
use crate::template::{is_positional, RawTemplate};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::info;

const META_ID: &str = "_id";
const META_MATCH: &str = "_match";
const META_EXTENDS: &str = "_extends";
const META_IGNORE: &str = "_ignore";
const META_EXTRA: &str = "_extra";

const RESERVED: [&str; 4] = [META_ID, META_MATCH, META_EXTENDS, TEMPLATE_KEY];

/// Characters that turn a source key into a pattern.
const PATTERN_CHARS: &[char] = &[
    '\\', '.', '+', '*', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$',
];

// ─────────────────────────────────────────────────────────────────────────────
// Destinations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    /// Captured index minus `offset`.
    IndexRef { offset: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    segments: Vec<Segment>,
}

impl Destination {
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split('.')
            .map(|seg| match parse_index_ref(seg) {
                Some(offset) => Segment::IndexRef { offset },
                None => Segment::Key(seg.to_string()),
            })
            .collect();
        Destination { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn has_index_ref(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::IndexRef { .. }))
    }

    fn first_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Concrete path for a write. `None` when an index reference has no
    /// index to work with or would go below zero.
    fn resolve(&self, index: Option<u64>) -> Option<Vec<String>> {
        self.segments
            .iter()
            .map(|seg| match seg {
                Segment::Key(k) => Some(k.clone()),
                Segment::IndexRef { offset } => {
                    index?.checked_sub(*offset).map(|i| i.to_string())
                }
            })
            .collect()
    }
}

/// `\1` → 0, `\1-2` → 2.
fn parse_index_ref(seg: &str) -> Option<u64> {
    let rest = seg.strip_prefix("\\1")?;
    if rest.is_empty() {
        return Some(0);
    }
    rest.strip_prefix('-')?.parse().ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Field rules
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum FieldRule {
    Literal { key: String, dest: Destination },
    Pattern { regex: Regex, dest: Destination },
}

impl FieldRule {
    fn parse(rule_id: &str, source: &str, dest: &str) -> Result<Self> {
        let dest = Destination::parse(dest);
        if let Some(first) = dest.first_key() {
            if RESERVED.contains(&first) {
                return Err(invalid(rule_id, format!("'{first}' cannot be a destination")));
            }
        }

        if !source.contains(PATTERN_CHARS) {
            if dest.has_index_ref() {
                return Err(invalid(
                    rule_id,
                    format!("literal key '{source}' cannot use an index reference"),
                ));
            }
            return Ok(FieldRule::Literal { key: source.to_string(), dest });
        }

        let regex = Regex::new(&format!("^(?:{source})$"))
            .map_err(|e| invalid(rule_id, format!("bad pattern '{source}': {e}")))?;
        Ok(FieldRule::Pattern { regex, dest })
    }

    /// Destination path for a raw key, if this rule applies to it.
    fn target(&self, key: &str) -> Option<Vec<String>> {
        match self {
            FieldRule::Literal { key: k, dest } => (k == key).then(|| dest.resolve(None)).flatten(),
            FieldRule::Pattern { regex, dest } => {
                let caps = regex.captures(key)?;
                if !dest.has_index_ref() {
                    return dest.resolve(None);
                }
                // The index comes from the first group, so `q2` can address
                // item 2 as well as a bare positional `2` can.
                let matched = caps.get(1).map_or(key, |m| m.as_str());
                if !is_positional(matched) {
                    return None;
                }
                dest.resolve(Some(matched.parse().ok()?))
            }
        }
    }
}

fn invalid(rule: &str, reason: String) -> Error {
    Error::InvalidRule { rule: rule.to_string(), reason }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TransformRule {
    pub id: String,
    pub matches: HashSet<String>,
    pub extends: Vec<String>,
    fields: Vec<FieldRule>,
    ignore: HashSet<String>,
    extra: Vec<(String, String)>,
}

impl TransformRule {
    /// Rewrite a raw template under this rule. Each raw key is written once,
    /// through the first field rule that applies to it; keys no rule covers
    /// keep their own name.
    pub fn apply(&self, raw: &RawTemplate) -> NodeMap {
        let mut out = NodeMap::new();
        out.insert(TEMPLATE_KEY, Node::leaf(self.id.clone()));

        for (key, value) in raw.fields() {
            if self.ignore.contains(key) || key == TEMPLATE_KEY {
                continue;
            }
            match self.fields.iter().find_map(|f| f.target(key)) {
                Some(path) => out.insert_path(&path, Node::leaf(value)),
                None => out.insert_path(&[key], Node::leaf(value)),
            }
        }

        for (path, value) in &self.extra {
            let path: Vec<&str> = path.split('.').collect();
            out.insert_path(&path, Node::leaf(value.clone()));
        }

        out
    }
}

/// Record for a template no rule covers: raw fields under `identity`.
pub fn pass_through(raw: &RawTemplate, identity: &str) -> NodeMap {
    let mut out = NodeMap::new();
    out.insert(TEMPLATE_KEY, Node::leaf(identity));
    for (key, value) in raw.fields() {
        if key != TEMPLATE_KEY {
            out.insert(key, Node::leaf(value));
        }
    }
    out
}

/// A rule as written, before `_extends` is resolved.
struct RuleSource {
    id: String,
    matches: Vec<String>,
    extends: Vec<String>,
    fields: Vec<FieldRule>,
    ignore: Vec<String>,
    extra: Vec<(String, String)>,
}

impl RuleSource {
    fn from_mapping(mapping: &Mapping) -> Result<Self> {
        let id = mapping
            .get(META_ID)
            .and_then(scalar_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| invalid("?", format!("every rule needs a string '{META_ID}'")))?;

        let mut rule = RuleSource {
            id,
            matches: Vec::new(),
            extends: Vec::new(),
            fields: Vec::new(),
            ignore: Vec::new(),
            extra: Vec::new(),
        };

        for (key, value) in mapping {
            let key = scalar_string(key)
                .ok_or_else(|| invalid(&rule.id, "field keys must be scalars".into()))?;
            match key.as_str() {
                META_ID => {}
                META_MATCH => rule.matches = string_list(&rule.id, META_MATCH, value)?,
                META_EXTENDS => rule.extends = string_list(&rule.id, META_EXTENDS, value)?,
                META_IGNORE => rule.ignore = string_list(&rule.id, META_IGNORE, value)?,
                META_EXTRA => rule.extra = string_pairs(&rule.id, value)?,
                _ => {
                    let dest = scalar_string(value).ok_or_else(|| {
                        invalid(&rule.id, format!("destination for '{key}' must be a string"))
                    })?;
                    rule.fields.push(FieldRule::parse(&rule.id, &key, &dest)?);
                }
            }
        }

        Ok(rule)
    }
}

fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_list(rule: &str, field: &str, v: &Value) -> Result<Vec<String>> {
    match v {
        Value::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_string(item)
                    .ok_or_else(|| invalid(rule, format!("'{field}' entries must be strings")))
            })
            .collect(),
        other => scalar_string(other)
            .map(|s| vec![s])
            .ok_or_else(|| invalid(rule, format!("'{field}' must be a list"))),
    }
}

fn string_pairs(rule: &str, v: &Value) -> Result<Vec<(String, String)>> {
    let Value::Mapping(mapping) = v else {
        return Err(invalid(rule, format!("'{META_EXTRA}' must be a mapping")));
    };
    mapping
        .iter()
        .map(|(k, v)| match (scalar_string(k), scalar_string(v)) {
            (Some(k), Some(v)) => Ok((k, v)),
            _ => Err(invalid(rule, format!("'{META_EXTRA}' entries must be scalars"))),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Table
// ─────────────────────────────────────────────────────────────────────────────

/// An immutable, ordered rule set with a lookup index from raw template id
/// to the first rule matching it.
#[derive(Debug, Clone, Default)]
pub struct TransformTable {
    rules: Vec<TransformRule>,
    index: HashMap<String, usize>,
}

impl TransformTable {
    /// Read and compile a transform source file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            Error::TransformSourceUnavailable { path: path.to_path_buf(), source }
        })?;
        let table = Self::from_yaml_str(&text).map_err(|e| match e {
            Error::TransformSourceInvalid { source, .. } => {
                Error::TransformSourceInvalid { path: path.to_path_buf(), source }
            }
            other => other,
        })?;
        info!(path = %path.display(), rules = table.len(), "loaded transform table");
        Ok(table)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let mappings: Vec<Mapping> = serde_yaml::from_str(text)
            .map_err(|source| Error::TransformSourceInvalid { path: PathBuf::new(), source })?;
        let sources = mappings
            .iter()
            .map(RuleSource::from_mapping)
            .collect::<Result<Vec<_>>>()?;
        Self::build(sources)
    }

    fn build(sources: Vec<RuleSource>) -> Result<Self> {
        let by_id: HashMap<&str, usize> = sources
            .iter()
            .enumerate()
            .rev()
            .map(|(i, r)| (r.id.as_str(), i))
            .collect();

        let mut rules = Vec::with_capacity(sources.len());
        for (i, source) in sources.iter().enumerate() {
            let mut fields = Vec::new();
            let mut ignore = HashSet::new();
            let mut extra = Vec::new();
            let mut visiting = vec![i];
            collect_inherited(
                &sources,
                &by_id,
                i,
                &mut visiting,
                &mut fields,
                &mut ignore,
                &mut extra,
            )?;

            rules.push(TransformRule {
                id: source.id.clone(),
                matches: source.matches.iter().map(|m| snake_case(m)).collect(),
                extends: source.extends.clone(),
                fields,
                ignore,
                extra,
            });
        }

        let mut index = HashMap::new();
        for (i, rule) in rules.iter().enumerate() {
            for m in &rule.matches {
                index.entry(m.clone()).or_insert(i);
            }
        }

        Ok(TransformTable { rules, index })
    }

    /// First rule, in table order, whose match set contains `raw_id`.
    pub fn resolve(&self, raw_id: &str) -> Option<&TransformRule> {
        self.index.get(raw_id).map(|&i| &self.rules[i])
    }

    pub fn apply(&self, raw: &RawTemplate, rule: &TransformRule) -> NodeMap {
        rule.apply(raw)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Own fields first, then each `_extends` parent in order, depth first.
fn collect_inherited(
    sources: &[RuleSource],
    by_id: &HashMap<&str, usize>,
    at: usize,
    visiting: &mut Vec<usize>,
    fields: &mut Vec<FieldRule>,
    ignore: &mut HashSet<String>,
    extra: &mut Vec<(String, String)>,
) -> Result<()> {
    let source = &sources[at];
    fields.extend(source.fields.iter().cloned());
    ignore.extend(source.ignore.iter().cloned());
    for (k, v) in &source.extra {
        if !extra.iter().any(|(ek, _)| ek == k) {
            extra.push((k.clone(), v.clone()));
        }
    }

    for parent in &source.extends {
        let &p = by_id.get(parent.as_str()).ok_or_else(|| {
            invalid(&source.id, format!("extends unknown rule '{parent}'"))
        })?;
        if visiting.contains(&p) {
            let root = &sources[visiting[0]].id;
            return Err(invalid(root, format!("extends cycle through '{parent}'")));
        }
        visiting.push(p);
        collect_inherited(sources, by_id, p, visiting, fields, ignore, extra)?;
        visiting.pop();
    }
    Ok(())
}

/// Load-once holder for a transform table. Extraction borrows the table from
/// here; tests build one around an in-memory table with [`TableCache::with_table`].
#[derive(Debug)]
pub struct TableCache {
    source: PathBuf,
    cell: OnceCell<TransformTable>,
}

impl TableCache {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        TableCache { source: source.into(), cell: OnceCell::new() }
    }

    pub fn with_table(table: TransformTable) -> Self {
        TableCache { source: PathBuf::new(), cell: OnceCell::with_value(table) }
    }

    /// The cached table, reading the source on first use. A failed load is
    /// returned to the caller and nothing is cached.
    pub fn get(&self) -> Result<&TransformTable> {
        self.cell.get_or_try_init(|| TransformTable::load(&self.source))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Where to look for the rule file when none is given, relative to the
/// working directory.
pub const TRANSFORM_CANDIDATES: [&str; 2] =
    ["schema/transforms.yaml", "../../schema/transforms.yaml"];

pub fn find_transform_source() -> Result<PathBuf> {
    TRANSFORM_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or_else(|| Error::TransformSourceMissing { tried: TRANSFORM_CANDIDATES.join(", ") })
}
