//! Section tree → predicate-keyed map.
//!
//! Every template record found anywhere in the tree is emitted under its
//! identity. The first occurrence of an identity is stored as is, the second
//! turns the entry into a list, later ones append. Keys keep the order in
//! which identities were first seen.

use crate::node::{Node, NodeMap, TEMPLATE_KEY};
use crate::section::PREFACE_KEY;
use tracing::debug;

/// Key holding the dot-joined section path a record was found under.
pub const CONTEXT_KEY: &str = "ctx";

pub fn flatten(node: &Node) -> NodeMap {
    let mut out = NodeMap::new();
    let mut path = Vec::new();
    walk(node, &mut path, None, &mut out);
    out
}

fn walk<'n>(node: &'n Node, path: &mut Vec<&'n str>, key: Option<&'n str>, out: &mut NodeMap) {
    match node {
        Node::List(items) => {
            for item in items {
                walk(item, path, key, out);
            }
        }
        Node::Object(map) => match node.template_id() {
            Some(id) => merge(out, id, record(map, path)),
            None => {
                for (k, v) in map.iter() {
                    // Preface lists belong to the section that holds them.
                    if k == PREFACE_KEY {
                        walk(v, path, Some(k), out);
                    } else {
                        path.push(k);
                        walk(v, path, Some(k), out);
                        path.pop();
                    }
                }
            }
        },
        Node::Leaf(_) | Node::Flag => match key {
            Some(k) => merge(out, k, node.clone()),
            None => debug!("dropping value outside any record"),
        },
    }
}

/// Only a record with no fields and no context collapses to `true`, so a
/// flag template found inside a section still says where it was found.
fn record(map: &NodeMap, path: &[&str]) -> Node {
    let mut fields = map.clone();
    fields.remove(TEMPLATE_KEY);
    if !path.is_empty() {
        fields.insert(CONTEXT_KEY, Node::leaf(path.join(".")));
    }
    if fields.is_empty() {
        return Node::Flag;
    }
    Node::Object(fields)
}

fn merge(out: &mut NodeMap, key: &str, node: Node) {
    match out.get_mut(key) {
        None => {
            out.insert(key, node);
        }
        Some(Node::List(items)) => items.push(node),
        Some(existing) => {
            let first = std::mem::replace(existing, Node::Flag);
            *existing = Node::List(vec![first, node]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str, fields: &[(&str, &str)]) -> Node {
        let mut map = NodeMap::new();
        map.insert(TEMPLATE_KEY, Node::leaf(id));
        for (k, v) in fields {
            map.insert(*k, Node::leaf(*v));
        }
        Node::Object(map)
    }

    fn section(preface: Vec<Node>, children: Vec<(&str, Node)>) -> Node {
        let mut map = NodeMap::new();
        map.insert(PREFACE_KEY, Node::List(preface));
        for (k, v) in children {
            map.insert(k, v);
        }
        Node::Object(map)
    }

    fn to_json(map: &NodeMap) -> serde_json::Value {
        serde_json::to_value(map).unwrap()
    }

    #[test]
    fn root_record_has_no_context() {
        let tree = section(vec![rec("derived", &[("lang", "en")])], vec![]);
        assert_eq!(to_json(&flatten(&tree)), json!({"derived": {"lang": "en"}}));
    }

    #[test]
    fn nested_record_gets_context_path() {
        let tree = section(
            vec![],
            vec![(
                "noun",
                section(
                    vec![],
                    vec![("synonyms", section(vec![rec("synonyms", &[("lang", "en")])], vec![]))],
                ),
            )],
        );
        assert_eq!(
            to_json(&flatten(&tree)),
            json!({"synonyms": {"lang": "en", "ctx": "noun.synonyms"}})
        );
    }

    #[test]
    fn empty_root_record_becomes_flag() {
        let tree = section(vec![rec("nounHeadword", &[])], vec![]);
        assert_eq!(to_json(&flatten(&tree)), json!({"nounHeadword": true}));
    }

    #[test]
    fn empty_nested_record_keeps_context() {
        let tree = section(
            vec![],
            vec![
                ("noun", section(vec![rec("nounHeadword", &[])], vec![])),
                ("properNoun", section(vec![rec("nounHeadword", &[])], vec![])),
            ],
        );
        assert_eq!(
            to_json(&flatten(&tree)),
            json!({"nounHeadword": [{"ctx": "noun"}, {"ctx": "properNoun"}]})
        );
    }

    #[test]
    fn two_occurrences_make_a_list() {
        let tree = section(
            vec![rec("synonym", &[("word", "a")])],
            vec![("noun", section(vec![rec("synonym", &[("word", "b")])], vec![]))],
        );
        assert_eq!(
            to_json(&flatten(&tree)),
            json!({"synonym": [{"word": "a"}, {"word": "b", "ctx": "noun"}]})
        );
    }

    #[test]
    fn three_occurrences_stay_flat() {
        let tree = section(
            vec![
                rec("synonym", &[("word", "a")]),
                rec("synonym", &[("word", "b")]),
                rec("synonym", &[("word", "c")]),
            ],
            vec![],
        );
        let out = flatten(&tree);
        let list = out.get("synonym").and_then(Node::as_list).unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.iter().all(|n| n.as_list().is_none()));
        assert_eq!(
            list[2].as_object().and_then(|m| m.get("word")),
            Some(&Node::leaf("c"))
        );
    }

    #[test]
    fn first_appearance_order() {
        let tree = section(
            vec![rec("b", &[("x", "1")]), rec("a", &[("x", "2")]), rec("b", &[("x", "3")])],
            vec![],
        );
        let out = flatten(&tree);
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn flags_merge_into_lists() {
        let tree = section(vec![rec("flag", &[]), rec("flag", &[])], vec![]);
        assert_eq!(to_json(&flatten(&tree)), json!({"flag": [true, true]}));
    }

    #[test]
    fn leaf_only_map_is_unchanged() {
        let mut map = NodeMap::new();
        map.insert("a", Node::leaf("x"));
        map.insert("b", Node::Flag);
        map.insert("c", Node::List(vec![Node::leaf("y"), Node::leaf("z")]));
        let once = flatten(&Node::Object(map.clone()));
        assert_eq!(once, map);
        assert_eq!(flatten(&Node::Object(once.clone())), once);
    }

    #[test]
    fn nested_fields_inside_record_are_kept() {
        let mut inner = NodeMap::new();
        inner.insert("word", Node::leaf("big"));
        let mut synonyms = NodeMap::new();
        synonyms.insert("0", Node::Object(inner));
        let mut map = NodeMap::new();
        map.insert(TEMPLATE_KEY, Node::leaf("synonyms"));
        map.insert("synonyms", Node::Object(synonyms));

        let tree = section(vec![Node::Object(map)], vec![]);
        assert_eq!(
            to_json(&flatten(&tree)),
            json!({"synonyms": {"synonyms": {"0": {"word": "big"}}}})
        );
    }

    #[test]
    fn empty_tree_flattens_to_nothing() {
        assert!(flatten(&section(vec![], vec![])).is_empty());
    }
}
