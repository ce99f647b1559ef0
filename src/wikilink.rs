//! `[[target|extra|...]]` → link record.

/// Parsed wikilink. `extra` keeps every pipe-separated segment after the
/// target; display text and category sort keys are not told apart here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    pub link: String,
    pub extra: Vec<String>,
}

/// Parse one link token. Surrounding `[[`/`]]` are stripped when present.
/// Returns `None` for an empty target.
pub fn parse_wikilink(token: &str) -> Option<WikiLink> {
    let inner = token.strip_prefix("[[").unwrap_or(token);
    let inner = inner.strip_suffix("]]").unwrap_or(inner);

    let mut parts = inner.split('|');
    let link = parts.next().filter(|s| !s.is_empty())?.to_string();
    let extra = parts.map(str::to_string).collect();

    Some(WikiLink { link, extra })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_and_extras() {
        let wl = parse_wikilink("[[x|y|z]]").unwrap();
        assert_eq!(wl.link, "x");
        assert_eq!(wl.extra, vec!["y", "z"]);
    }

    #[test]
    fn bare_target() {
        let wl = parse_wikilink("[[cat]]").unwrap();
        assert_eq!(wl.link, "cat");
        assert!(wl.extra.is_empty());
    }

    #[test]
    fn anchor_stays_in_target() {
        let wl = parse_wikilink("[[Man#Etymology 2|Man]]").unwrap();
        assert_eq!(wl.link, "Man#Etymology 2");
        assert_eq!(wl.extra, vec!["Man"]);
    }

    #[test]
    fn category_link() {
        let wl = parse_wikilink("[[Category:English nouns|cat]]").unwrap();
        assert_eq!(wl.link, "Category:English nouns");
        assert_eq!(wl.extra, vec!["cat"]);
    }

    #[test]
    fn empty_target_rejected() {
        assert!(parse_wikilink("[[]]").is_none());
        assert!(parse_wikilink("[[|display]]").is_none());
    }

    #[test]
    fn utf8_target() {
        let wl = parse_wikilink("[[αλφάβητος|alphabet]]").unwrap();
        assert_eq!(wl.link, "αλφάβητος");
    }
}
