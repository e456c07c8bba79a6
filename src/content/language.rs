// Language annotation heuristic
//
// Stop-word frequency vote over the languages the explanation path renders
// (English, Spanish, Swahili). This only annotates notes and documents; it
// never gates behavior, so a coarse heuristic is enough.

const EN_STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "from", "have", "are", "was", "will", "not",
];
const ES_STOPWORDS: &[&str] = &[
    "el", "la", "los", "las", "de", "que", "y", "para", "con", "una", "por", "del",
];
const SW_STOPWORDS: &[&str] = &[
    "na", "ya", "wa", "kwa", "ni", "za", "katika", "hii", "kama", "lakini", "sana", "cha",
];

/// Returns "en", "es", "sw", or "unknown".
pub fn detect_language(text: &str) -> &'static str {
    if text.len() < 10 {
        return "unknown";
    }

    let mut en = 0usize;
    let mut es = 0usize;
    let mut sw = 0usize;

    for word in text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
    {
        if EN_STOPWORDS.contains(&word.as_str()) {
            en += 1;
        }
        if ES_STOPWORDS.contains(&word.as_str()) {
            es += 1;
        }
        if SW_STOPWORDS.contains(&word.as_str()) {
            sw += 1;
        }
    }

    let best = en.max(es).max(sw);
    if best == 0 {
        "unknown"
    } else if best == en {
        "en"
    } else if best == es {
        "es"
    } else {
        "sw"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_english() {
        let text = "The allocation for this region will support the communities that need it";
        assert_eq!(detect_language(text), "en");
    }

    #[test]
    fn test_detects_spanish() {
        let text = "La asignación de recursos para las comunidades de la región del norte";
        assert_eq!(detect_language(text), "es");
    }

    #[test]
    fn test_detects_swahili() {
        let text = "Ugawaji wa rasilimali kwa mikoa ya kaskazini ni muhimu sana kwa maendeleo";
        assert_eq!(detect_language(text), "sw");
    }

    #[test]
    fn test_short_text_unknown() {
        assert_eq!(detect_language("hi"), "unknown");
        assert_eq!(detect_language(""), "unknown");
    }

    #[test]
    fn test_no_stopwords_unknown() {
        assert_eq!(detect_language("zzz qqq xxx yyy www vvv"), "unknown");
    }
}
