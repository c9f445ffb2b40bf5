//! Article text extraction from a serialized page DOM
//!
//! Boilerplate is removed by tag name and by class/id tokens matching a
//! fixed noise denylist. Only pages with enough remaining prose qualify.

use scraper::{ElementRef, Html, Selector};

/// Minimum extracted words for a page to qualify as an article.
pub const MIN_ARTICLE_WORDS: usize = 150;

/// Words kept in the payload sent for analysis.
pub const MAX_ARTICLE_WORDS: usize = 500;

/// Elements never treated as article prose.
const NOISE_TAGS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "form", "iframe", "svg",
    "button", "select", "template",
];

/// class/id tokens marking boilerplate containers.
const NOISE_KEYWORDS: &[&str] = &[
    "ad", "ads", "banner", "sidebar", "footer", "menu", "share", "social", "newsletter",
    "related", "subscribe", "popup", "breadcrumb", "breadcrumbs", "masthead", "toolbar",
];

/// Token prefixes marking boilerplate (advert, advertisement, nav, navbar, cookie-consent…).
const NOISE_PREFIXES: &[&str] = &["advert", "nav", "cookie", "comment", "promo", "sponsor"];

/// Qualifying article text pulled from a page
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleExtraction {
    pub title: String,
    /// Prose capped at [`MAX_ARTICLE_WORDS`] words
    pub text: String,
    /// Words in `text`
    pub word_count: usize,
}

/// Extract article prose, or `None` when fewer than
/// [`MIN_ARTICLE_WORDS`] words remain after stripping boilerplate.
pub fn extract_article(html: &str) -> Option<ArticleExtraction> {
    let document = Html::parse_document(html);

    let mut fragments = Vec::new();
    let root = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());
    collect_prose(root, &mut fragments);

    let words: Vec<&str> = fragments
        .iter()
        .flat_map(|f| f.split_whitespace())
        .collect();
    if words.len() < MIN_ARTICLE_WORDS {
        return None;
    }

    let kept = &words[..words.len().min(MAX_ARTICLE_WORDS)];
    Some(ArticleExtraction {
        title: extract_title(&document),
        text: kept.join(" "),
        word_count: kept.len(),
    })
}

fn collect_prose(element: ElementRef<'_>, out: &mut Vec<String>) {
    if is_noise(element) {
        return;
    }
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            collect_prose(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            let t = text.trim();
            if !t.is_empty() {
                out.push(t.to_string());
            }
        }
    }
}

fn is_noise(element: ElementRef<'_>) -> bool {
    let el = element.value();
    if NOISE_TAGS.contains(&el.name()) {
        return true;
    }
    if el.attr("aria-hidden") == Some("true") {
        return true;
    }
    let class_tokens = el.classes();
    let id_tokens = el.id().into_iter();
    class_tokens.chain(id_tokens).any(is_noise_identifier)
}

/// True when any `-`/`_`-separated token of a class or id is a noise keyword.
fn is_noise_identifier(identifier: &str) -> bool {
    identifier
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .any(|token| {
            NOISE_KEYWORDS.contains(&token.as_str())
                || NOISE_PREFIXES.iter().any(|p| token.starts_with(p))
        })
}

fn extract_title(document: &Html) -> String {
    for css in ["title", "h1"] {
        if let Ok(sel) = Selector::parse(css) {
            if let Some(el) = document.select(&sel).next() {
                let title = el.text().collect::<String>().trim().to_string();
                if !title.is_empty() {
                    return title;
                }
            }
        }
    }
    String::new()
}
