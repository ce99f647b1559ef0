//! Find template and wikilink tokens on a line of wikitext.

use crate::template::{parse_template, RawTemplate};
use crate::wikilink::{parse_wikilink, WikiLink};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Templates first: a link inside a template belongs to the template.
    static ref TOKEN: Regex = Regex::new(r"\{\{[^}]+\}\}|\[\[[^\]]+\]\]").unwrap();
    static ref OPENER: Regex = Regex::new(r"\{\{|\[\[").unwrap();
}

/// Longest fragment kept in a malformed-token report.
const FRAGMENT_LIMIT: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Template(RawTemplate),
    Link(WikiLink),
}

#[derive(Debug, Default)]
pub struct LineScan {
    pub tokens: Vec<Token>,
    /// Text starting at each opener that never closed.
    pub malformed: Vec<String>,
}

/// Every well-formed token on `line`, left to right.
pub fn scan_line(line: &str) -> LineScan {
    let mut scan = LineScan::default();
    let mut last_end = 0;

    for m in TOKEN.find_iter(line) {
        collect_malformed(&line[last_end..m.start()], &mut scan.malformed);
        last_end = m.end();

        let text = m.as_str();
        if text.starts_with("{{") {
            scan.tokens.push(Token::Template(parse_template(text)));
        } else {
            match parse_wikilink(text) {
                Some(link) => scan.tokens.push(Token::Link(link)),
                None => scan.malformed.push(truncate(text)),
            }
        }
    }
    collect_malformed(&line[last_end..], &mut scan.malformed);

    scan
}

fn collect_malformed(gap: &str, out: &mut Vec<String>) {
    if let Some(m) = OPENER.find(gap) {
        out.push(truncate(&gap[m.start()..]));
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(FRAGMENT_LIMIT).collect()
}
