//! Text normalization and keyword gates applied before embedding.
//!
//! Raw feed/channel items arrive with markup, links and handles that poison
//! embeddings; `clean_text` strips them down to the Turkish-alphabet core.
//! The spam/junk keyword lists are shared with the scoring engine.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Betting/advert vocabulary; items matching any of these never enter the pipeline.
pub const SPAM_KEYWORDS: &[&str] = &[
    "bet",
    "casino",
    "bonus",
    "çevrimsiz",
    "yatırımsız",
    "deneme bonusu",
    "yasal bahis",
    "slot",
    "rulet",
    "reklam",
    "tıkla",
    "linkte",
    "kazan",
];

/// Astrology/horoscope vocabulary; trends matching these are clamped to a low
/// score ceiling by the scoring engine regardless of signal strength.
pub const JUNK_KEYWORDS: &[&str] = &[
    "burç",
    "fal ",
    "günlük burç",
    "astroloji",
    "horoskop",
    "astrolog",
];

fn re(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// Turkish-aware lowercasing. Plain `to_lowercase` maps `I` to `i`, which is
/// wrong for Turkish dotless-ı and breaks keyword matching.
pub fn normalize_lower(text: &str) -> String {
    text.replace('İ', "i").replace('I', "ı").to_lowercase()
}

/// Strip noise from a raw item so it is safe to embed: HTML entities and tags,
/// URLs, @mentions, #hashtags, then anything outside word characters,
/// whitespace, Turkish letters and basic punctuation. Whitespace is collapsed.
/// Returns an empty string for empty/whitespace-only input.
pub fn clean_text(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let mut out = html_escape::decode_html_entities(raw).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    out = re(&RE_TAGS, r"(?is)</?[^>]+>").replace_all(&out, " ").to_string();

    static RE_URL: OnceCell<Regex> = OnceCell::new();
    out = re(&RE_URL, r"http\S+|www\.\S+").replace_all(&out, "").to_string();

    static RE_MENTION: OnceCell<Regex> = OnceCell::new();
    out = re(&RE_MENTION, r"@\w+").replace_all(&out, "").to_string();

    static RE_HASHTAG: OnceCell<Regex> = OnceCell::new();
    out = re(&RE_HASHTAG, r"#\w+").replace_all(&out, "").to_string();

    static RE_NOISE: OnceCell<Regex> = OnceCell::new();
    out = re(&RE_NOISE, r"[^\w\sçğıöşüÇĞİÖŞÜ,.?!-]")
        .replace_all(&out, " ")
        .to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    out = re(&RE_WS, r"\s+").replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// True for texts that are too short to be news or that carry betting/advert
/// keywords. Applied to the raw text before cleaning.
pub fn is_spam(text: &str) -> bool {
    if text.trim().chars().count() < 15 {
        return true;
    }
    let lower = normalize_lower(text);
    SPAM_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// True if an already-normalized (lowercased) text carries junk vocabulary.
pub fn contains_junk(normalized: &str) -> bool {
    JUNK_KEYWORDS.iter().any(|kw| normalized.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_urls_mentions_hashtags_and_tags() {
        let raw = "<b>Son dakika:</b> deprem oldu http://example.com/x @muhabir #deprem";
        let out = clean_text(raw);
        assert_eq!(out, "Son dakika deprem oldu");
        assert!(!out.contains('@'));
        assert!(!out.contains('#'));
        assert!(!out.contains("http"));
    }

    #[test]
    fn clean_collapses_whitespace_and_decodes_entities() {
        let out = clean_text("Merkez&nbsp;Bankası   faiz \n kararı");
        assert_eq!(out, "Merkez Bankası faiz kararı");
    }

    #[test]
    fn clean_empty_input_yields_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   \n\t "), "");
    }

    #[test]
    fn turkish_casing_is_normalized() {
        assert_eq!(normalize_lower("İstanbul IRMAK"), "istanbul ırmak");
    }

    #[test]
    fn spam_gate_catches_short_and_keyword_texts() {
        assert!(is_spam("tıkla"));
        assert!(is_spam("Deneme bonusu veren siteler burada kazan"));
        assert!(!is_spam("Meclis bütçe görüşmelerine bugün devam ediyor"));
    }

    #[test]
    fn junk_detection_works_on_normalized_text() {
        assert!(contains_junk(&normalize_lower(
            "Günlük burç yorumları: Koç burcu"
        )));
        assert!(!contains_junk(&normalize_lower("Ekonomide yeni paket")));
    }
}
