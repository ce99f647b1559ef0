//! Language codes and the `==Heading==` names Wiktionary files them under.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref LANGUAGE_NAMES: HashMap<&'static str, &'static str> = [
        ("en", "English"),
        ("es", "Spanish"),
        ("fr", "French"),
        ("de", "German"),
        ("it", "Italian"),
        ("pt", "Portuguese"),
        ("ja", "Japanese"),
        ("ko", "Korean"),
        ("nl", "Dutch"),
        ("sv", "Swedish"),
        ("fi", "Finnish"),
        ("no", "Norwegian"),
        ("da", "Danish"),
        ("is", "Icelandic"),
        ("pl", "Polish"),
        ("hu", "Hungarian"),
        ("cs", "Czech"),
        ("ro", "Romanian"),
        ("ru", "Russian"),
        ("tr", "Turkish"),
        ("hr", "Croatian"),
        ("el", "Greek"),
        ("he", "Hebrew"),
        ("ar", "Arabic"),
        ("hi", "Hindi"),
        ("th", "Thai"),
        ("uk", "Ukrainian"),
        ("id", "Indonesian"),
        ("fa", "Persian"),
        ("bn", "Bengali"),
        ("vi", "Vietnamese"),
        ("sr", "Serbian"),
        ("sk", "Slovak"),
        ("sl", "Slovene"),
        ("eo", "Esperanto"),
        ("tl", "Tagalog"),
        ("ms", "Malay"),
        ("km", "Khmer"),
        ("lo", "Lao"),
        ("ka", "Georgian"),
        ("la", "Latin"),
        ("ta", "Tamil"),
        ("te", "Telugu"),
        ("sa", "Sanskrit"),
        ("az", "Azerbaijani"),
    ]
    .into_iter()
    .collect();
}

/// Heading name for an ISO 639 code, e.g. `"en"` → `"English"`.
pub fn language_heading(code: &str) -> Option<&'static str> {
    LANGUAGE_NAMES.get(code).copied()
}
