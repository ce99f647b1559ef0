//! Where wikitext comes from: MediaWiki API `action=parse` payloads and
//! XML dumps (plain or bz2). Fetching is someone else's job; this module
//! only decodes what was fetched.

use crate::error::Result;
use bzip2::read::BzDecoder;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

lazy_static! {
    static ref TITLE_PATTERN: Regex = Regex::new(r"<title>([^<]+)</title>").unwrap();
    static ref NS_PATTERN: Regex = Regex::new(r"<ns>(\d+)</ns>").unwrap();
    static ref TEXT_PATTERN: Regex = Regex::new(r"(?s)<text[^>]*>(.+?)</text>").unwrap();
    static ref REDIRECT_PATTERN: Regex = Regex::new(r#"<redirect\s+title="[^"]+""#).unwrap();
}

const PAGE_OPEN: &[u8] = b"<page>";
const PAGE_CLOSE: &[u8] = b"</page>";

// ─────────────────────────────────────────────────────────────────────────────
// API payloads
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    parse: ParsePayload,
}

#[derive(Debug, Deserialize)]
struct ParsePayload {
    #[serde(default)]
    title: Option<String>,
    wikitext: WikitextPayload,
}

#[derive(Debug, Deserialize)]
struct WikitextPayload {
    #[serde(rename = "*")]
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPage {
    pub title: Option<String>,
    pub wikitext: String,
}

/// Decode `{ "parse": { "title": ..., "wikitext": { "*": "..." } } }`.
pub fn parse_api_response(json: &str) -> Result<ApiPage> {
    let response: ApiResponse = serde_json::from_str(json)?;
    Ok(ApiPage { title: response.parse.title, wikitext: response.parse.wikitext.text })
}

// ─────────────────────────────────────────────────────────────────────────────
// XML dumps
// ─────────────────────────────────────────────────────────────────────────────

/// A main-namespace page pulled out of a dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub title: String,
    pub text: String,
    pub page_id: usize,
}

/// Open a file for reading, decompressing `.bz2` transparently.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    let reader: Box<dyn BufRead + Send> = if path.extension().is_some_and(|e| e == "bz2") {
        Box::new(BufReader::new(BzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Feed each `<page>...</page>` block to `callback` until the input ends or
/// the callback returns false.
pub fn scan_pages(mut reader: impl Read, mut callback: impl FnMut(String) -> bool) -> Result<()> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; 1024 * 1024];

    loop {
        let bytes_read = reader.read(&mut chunk)?;
        if bytes_read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..bytes_read]);

        while let Some(start) = find_bytes(&buffer, PAGE_OPEN) {
            let Some(end_offset) = find_bytes(&buffer[start..], PAGE_CLOSE) else {
                buffer.drain(..start);
                break;
            };
            let end = start + end_offset + PAGE_CLOSE.len();
            // Split on byte boundaries, so decode only whole pages.
            let page_xml = String::from_utf8_lossy(&buffer[start..end]).into_owned();
            buffer.drain(..end);

            if !callback(page_xml) {
                return Ok(());
            }
        }

        // Keep a tail long enough to hold a split "<page>" marker.
        if find_bytes(&buffer, PAGE_OPEN).is_none() && buffer.len() > PAGE_OPEN.len() {
            buffer.drain(..buffer.len() - PAGE_OPEN.len());
        }
    }

    Ok(())
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Title and text of a main-namespace, non-redirect page.
pub fn page_from_xml(page_xml: &str, page_id: usize) -> Option<RawPage> {
    let title = TITLE_PATTERN.captures(page_xml).map(|cap| decode_entities(&cap[1]))?;

    if let Some(cap) = NS_PATTERN.captures(page_xml) {
        if &cap[1] != "0" {
            return None;
        }
    }
    if REDIRECT_PATTERN.is_match(page_xml) {
        return None;
    }

    let text = TEXT_PATTERN.captures(page_xml).map(|cap| decode_entities(&cap[1]))?;
    Some(RawPage { title, text, page_id })
}

/// Undo the XML escaping dumps apply to page text.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DUMP: &str = r#"<mediawiki>
  <page>
    <title>cat</title>
    <ns>0</ns>
    <id>1</id>
    <revision><text bytes="40" xml:space="preserve">==English==
===Noun===
{{en-noun}}
# A [[feline]] &amp; pet.</text></revision>
  </page>
  <page>
    <title>Wiktionary:About</title>
    <ns>4</ns>
    <revision><text>ignored</text></revision>
  </page>
  <page>
    <title>kitty cat</title>
    <ns>0</ns>
    <redirect title="cat" />
    <revision><text>#REDIRECT [[cat]]</text></revision>
  </page>
</mediawiki>"#;

    fn pages(input: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        scan_pages(input, |p| {
            out.push(p);
            true
        })
        .unwrap();
        out
    }

    #[test]
    fn api_response() {
        let page = parse_api_response(
            r#"{"parse": {"title": "cat", "pageid": 7, "wikitext": {"*": "==English=="}}}"#,
        )
        .unwrap();
        assert_eq!(page.title.as_deref(), Some("cat"));
        assert_eq!(page.wikitext, "==English==");
    }

    #[test]
    fn api_response_without_wikitext_is_error() {
        assert!(parse_api_response(r#"{"error": {"code": "missingtitle"}}"#).is_err());
    }

    #[test]
    fn scans_all_pages() {
        assert_eq!(pages(DUMP.as_bytes()).len(), 3);
    }

    #[test]
    fn callback_can_stop() {
        let mut seen = 0;
        scan_pages(DUMP.as_bytes(), |_| {
            seen += 1;
            false
        })
        .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn main_namespace_only() {
        let raw: Vec<_> = pages(DUMP.as_bytes())
            .iter()
            .enumerate()
            .filter_map(|(i, p)| page_from_xml(p, i))
            .collect();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].title, "cat");
        assert!(raw[0].text.starts_with("==English==\n===Noun==="));
        assert!(raw[0].text.ends_with("[[feline]] & pet."));
    }

    #[test]
    fn multibyte_text_survives() {
        let xml = "<page><title>café</title><ns>0</ns><text>==French== ü ß</text></page>";
        let page = page_from_xml(&pages(xml.as_bytes())[0], 0).unwrap();
        assert_eq!(page.title, "café");
        assert_eq!(page.text, "==French== ü ß");
    }

    #[test]
    fn entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &amp;amp;"), "a <b> &amp;");
        assert_eq!(decode_entities("plain"), "plain");
    }

    #[test]
    fn reads_bz2_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.xml.bz2");
        let file = File::create(&path).unwrap();
        let mut encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::fast());
        encoder.write_all(DUMP.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let reader = open_input(&path).unwrap();
        assert_eq!(pages_from(reader).len(), 3);
    }

    fn pages_from(reader: impl Read) -> Vec<String> {
        let mut out = Vec::new();
        scan_pages(reader, |p| {
            out.push(p);
            true
        })
        .unwrap();
        out
    }
}
