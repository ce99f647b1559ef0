//! `{{name|positional|key=value}}` → ordered key/value record.

use crate::case::snake_case;

/// Value written for a named argument with nothing after the `=`.
pub const TRUE_SENTINEL: &str = "true";

/// A template invocation as written: its normalized name plus its arguments
/// in source order. Positional arguments are keyed "2", "3", ... because "1"
/// belongs to the name segment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawTemplate {
    id: Option<String>,
    name: Option<String>,
    fields: Vec<(String, String)>,
}

impl RawTemplate {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The name segment as written, before snake_casing. This is the
    /// template's page title on the wiki.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn insert(&mut self, key: String, value: String) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }
}

/// True for keys produced by positional arguments.
pub fn is_positional(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

/// Parse one template token. Surrounding `{{`/`}}` are stripped when present,
/// so callers may pass either the whole token or its inside.
pub fn parse_template(token: &str) -> RawTemplate {
    let inner = token.strip_prefix("{{").unwrap_or(token);
    let inner = inner.strip_suffix("}}").unwrap_or(inner);

    let mut template = RawTemplate::default();
    let mut segments = inner.split('|');
    let mut next_index = 2usize;

    if let Some(first) = segments.next() {
        if first.contains('=') {
            insert_named(&mut template, first);
        } else {
            // Punctuation-only names such as `!` have no words to case.
            let id = match snake_case(first) {
                id if id.is_empty() => first.trim().to_string(),
                id => id,
            };
            if !id.is_empty() {
                template.name = Some(first.trim().to_string());
                template.id = Some(id);
            }
        }
    }

    for segment in segments {
        if segment.contains('=') {
            insert_named(&mut template, segment);
        } else {
            template.insert(next_index.to_string(), segment.to_string());
            next_index += 1;
        }
    }

    template
}

fn insert_named(template: &mut RawTemplate, segment: &str) {
    let (key, value) = segment.split_once('=').unwrap_or((segment, ""));
    let value = if value.is_empty() { TRUE_SENTINEL } else { value };
    template.insert(key.to_string(), value.to_string());
}
