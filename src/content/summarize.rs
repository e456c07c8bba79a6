// Extractive text summarization
//
// Keeps the first, middle, and last sentences plus evenly-strided picks
// until the keep budget (ratio of sentence count, minimum 3) is met.
// Short texts pass through untouched.

pub fn summarize(text: &str, ratio: f64) -> String {
    if text.is_empty() || text.len() < 200 {
        return text.to_string();
    }

    let sentences: Vec<&str> = text.split('.').collect();
    let n = sentences.len();
    if n <= 5 {
        return text.to_string();
    }

    let keep = std::cmp::max(3, (n as f64 * ratio) as usize);

    let mut indices = vec![0, n / 2, n - 1];
    let step = std::cmp::max(1, n / keep);
    let mut i = step;
    while i < n {
        indices.push(i);
        i += step;
    }
    indices.sort_unstable();
    indices.dedup();
    indices.truncate(keep);

    let mut summary = indices
        .iter()
        .filter_map(|&i| sentences.get(i))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(". ");
    summary.push('.');
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_passes_through() {
        let text = "Brief note about the region.";
        assert_eq!(summarize(text, 0.3), text);
    }

    #[test]
    fn test_few_sentences_pass_through() {
        // Over 200 chars but only 4 sentences
        let text = "This is the opening sentence which runs long enough to matter for length checks. \
                    Then a second sentence follows with supporting detail. \
                    A third sentence adds additional context about the area. \
                    Finally the fourth closes out the short document";
        assert_eq!(summarize(text, 0.3), text);
    }

    #[test]
    fn test_long_text_is_shortened() {
        let text = (0..40)
            .map(|i| format!("Sentence number {i} carries some detail about allocation"))
            .collect::<Vec<_>>()
            .join(". ");
        let summary = summarize(&text, 0.3);
        assert!(summary.len() < text.len());
        // First and last sentences are always kept
        assert!(summary.contains("Sentence number 0"));
        assert!(summary.ends_with('.'));
    }

    #[test]
    fn test_keep_minimum_three() {
        let text = (0..8)
            .map(|i| format!("A reasonably long sentence about the budget item number {i} here"))
            .collect::<Vec<_>>()
            .join(". ");
        let summary = summarize(&text, 0.01);
        let kept = summary.split('.').filter(|s| !s.trim().is_empty()).count();
        assert!(kept >= 3);
    }
}
