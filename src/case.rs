//! Name normalization for template ids and section keys.

use unicode_normalization::UnicodeNormalization;

/// Split a name into words on separators, lower or digit → upper transitions
/// and the end of an uppercase run ("IPAChar" → "IPA", "Char"). Digits stay
/// with the letters before them ("decl2").
fn words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            let lower_to_upper = (prev.is_lowercase() || prev.is_numeric()) && ch.is_uppercase();
            let acronym_end = prev.is_uppercase()
                && ch.is_uppercase()
                && next.is_some_and(|n| n.is_lowercase());
            if lower_to_upper || acronym_end {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `"plural of"` → `"plural_of"`, `"en-noun"` → `"en_noun"`, `"IPA"` → `"ipa"`.
pub fn snake_case(s: &str) -> String {
    words(s)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// `"Proper noun"` → `"properNoun"`, `"Etymology 1"` → `"etymology1"`.
pub fn camel_case(s: &str) -> String {
    let mut out = String::new();
    for (i, word) in words(s).iter().enumerate() {
        let lower = word.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
            continue;
        }
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// NFC-normalize a page title so equal words always produce equal IRIs.
pub fn normalize_word(word: &str) -> String {
    word.trim().nfc().collect()
}
