use once_cell::sync::Lazy;
use regex::Regex;

static BODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").expect("body regex"));
static TITLE_ELEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>.*?</title>").expect("title regex"));
static WRAPPER_TAGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?(?:html|head|body)[^>]*>").expect("wrapper regex"));
static DOCTYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<!doctype[^>]*>").expect("doctype regex"));
static STRONG_EM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*\*([^*<>\n]+)\*\*\*").expect("strong em regex"));
static STRONG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*<>\n]+)\*\*").expect("strong regex"));
static EM_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*<>\n]+)\*").expect("em regex"));
static EM_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[\s(])_([^_<>\n]+)_").expect("underscore regex"));
static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("blank line regex"));

/// Normalizes model output into an HTML fragment: no code fences, no
/// document wrappers, no markdown emphasis, bare text wrapped in `<p>`.
///
/// Applying it to its own output changes nothing.
pub fn clean_ai_response(raw: &str) -> String {
    // Models nest fences and whole documents inside each other.
    let mut text = raw.trim().to_string();
    loop {
        let unwrapped = unwrap_document(strip_fences(&text));
        if unwrapped == text {
            break;
        }
        text = unwrapped;
    }

    let text = STRONG_EM.replace_all(&text, "<strong><em>$1</em></strong>");
    let text = STRONG.replace_all(&text, "<strong>$1</strong>");
    let text = EM_STAR.replace_all(&text, "<em>$1</em>");
    let text = EM_UNDERSCORE.replace_all(&text, "${1}<em>${2}</em>");

    if text.is_empty() || text.starts_with('<') {
        return text.into_owned();
    }
    BLANK_LINE
        .split(&text)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| format!("<p>{block}</p>"))
        .collect()
}

fn unwrap_document(text: &str) -> String {
    if !looks_like_document(text) {
        return text.to_string();
    }
    match BODY.captures(text) {
        Some(caps) => caps[1].trim().to_string(),
        None => {
            let without_title = TITLE_ELEMENT.replace_all(text, "");
            let without_doctype = DOCTYPE.replace_all(&without_title, "");
            WRAPPER_TAGS
                .replace_all(&without_doctype, "")
                .trim()
                .to_string()
        }
    }
}

fn strip_fences(mut text: &str) -> &str {
    loop {
        let before = text;
        if let Some(rest) = text.strip_prefix("```") {
            let rest = rest
                .strip_prefix("html")
                .or_else(|| rest.strip_prefix("HTML"))
                .unwrap_or(rest);
            text = rest.trim();
        }
        if let Some(rest) = text.strip_suffix("```") {
            text = rest.trim();
        }
        if text == before {
            return text;
        }
    }
}

fn looks_like_document(text: &str) -> bool {
    let head = text.get(..9).unwrap_or(text).to_ascii_lowercase();
    head.starts_with("<html") || head.starts_with("<!doctype")
}
