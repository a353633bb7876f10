use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::util::normalize_whitespace;

static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("percentage regex is valid"));
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20[2-5]\d|2060)\b").expect("year regex is valid"));
static CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s*\d[\d,]*(?:\.\d+)?(?:\s*(?:million|billion|thousand)\b|[MBK]\b)?")
        .expect("currency regex is valid")
});

/// Sentence spans of one page, in byte offsets.
///
/// A sentence ends after `.`, `!` or `?` when followed by whitespace or the
/// end of the text, or at a blank line.
#[derive(Debug, Clone)]
pub struct SentenceIndex {
    spans: Vec<Range<usize>>,
}

impl SentenceIndex {
    pub fn new(text: &str) -> Self {
        let mut spans = Vec::new();
        let mut start = 0;
        let mut chars = text.char_indices().peekable();

        while let Some((index, character)) = chars.next() {
            let next = chars.peek().map(|(_, next)| *next);
            match character {
                '.' | '!' | '?' if next.is_none_or(char::is_whitespace) => {
                    spans.push(start..index + 1);
                    start = index + 1;
                }
                '\n' if next == Some('\n') => {
                    if start < index {
                        spans.push(start..index);
                    }
                    start = index + 1;
                }
                _ => {}
            }
        }

        if start < text.len() {
            spans.push(start..text.len());
        }

        Self { spans }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Indices of the sentences a byte range touches.
    pub fn sentences_for(&self, start: usize, end: usize) -> Range<usize> {
        if self.spans.is_empty() {
            return 0..0;
        }
        let last = self.spans.len() - 1;
        let first = self.spans.partition_point(|span| span.end <= start).min(last);
        let through = self
            .spans
            .partition_point(|span| span.end < end.max(start + 1))
            .min(last);
        first..through.max(first) + 1
    }

    /// Byte range covering every sentence the match touches.
    pub fn sentence_bounds(&self, start: usize, end: usize) -> Range<usize> {
        let indices = self.sentences_for(start, end);
        if indices.is_empty() {
            return start..end;
        }
        let lower = self.spans[indices.start].start.min(start);
        let upper = self.spans[indices.end - 1].end.max(end);
        lower..upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    pub window_chars: usize,
    pub max_quote_chars: usize,
}

impl ContextWindow {
    /// Quote for the match at `start..end`: its sentence, clipped to
    /// `window_chars` on either side, capped at `max_quote_chars` while keeping
    /// the match in view, whitespace collapsed.
    pub fn quote(&self, text: &str, sentences: &SentenceIndex, start: usize, end: usize) -> String {
        let sentence = sentences.sentence_bounds(start, end);
        let mut quote_start = sentence.start.max(back_chars(text, start, self.window_chars));
        let mut quote_end = sentence.end.min(forward_chars(text, end, self.window_chars));

        let before = text[quote_start..start].chars().count();
        let matched = text[start..end].chars().count();
        let after = text[end..quote_end].chars().count();

        if before + matched + after > self.max_quote_chars {
            let budget = self.max_quote_chars.saturating_sub(matched);
            let keep_before = before.min((budget / 2).max(budget.saturating_sub(after)));
            let keep_after = after.min(budget - keep_before);
            quote_start = forward_chars(text, quote_start, before - keep_before);
            quote_end = back_chars(text, quote_end, after - keep_after);
        }

        truncate_chars(
            &normalize_whitespace(&text[quote_start..quote_end]),
            self.max_quote_chars,
        )
    }
}

/// Byte offset `count` characters before `position`, or 0.
pub fn back_chars(text: &str, position: usize, count: usize) -> usize {
    if count == 0 {
        return position;
    }
    text[..position]
        .char_indices()
        .rev()
        .nth(count - 1)
        .map(|(index, _)| index)
        .unwrap_or(0)
}

/// Byte offset `count` characters after `position`, or the end of the text.
pub fn forward_chars(text: &str, position: usize, count: usize) -> usize {
    text[position..]
        .char_indices()
        .nth(count)
        .map(|(index, _)| position + index)
        .unwrap_or(text.len())
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((index, _)) => value[..index].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Percentages (`30 %` becomes `30%`) and years 2020-2060, by position,
/// without repeats. Digits inside a percentage never count as a year.
pub fn percentages_and_years(quote: &str) -> Vec<String> {
    let mut found = Vec::<(usize, String)>::new();
    let mut percent_spans = Vec::<Range<usize>>::new();

    for captures in PERCENTAGE.captures_iter(quote) {
        let (Some(whole), Some(number)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        percent_spans.push(whole.range());
        found.push((whole.start(), format!("{}%", number.as_str())));
    }

    for year in YEAR.find_iter(quote) {
        let inside_percentage = percent_spans
            .iter()
            .any(|span| span.start <= year.start() && year.end() <= span.end);
        if !inside_percentage {
            found.push((year.start(), year.as_str().to_string()));
        }
    }

    ordered_unique(found)
}

/// Dollar amounts with an optional magnitude word, e.g. `$5 million`.
pub fn currency_amounts(quote: &str) -> Vec<String> {
    let found = CURRENCY
        .find_iter(quote)
        .map(|amount| {
            let compact = normalize_whitespace(amount.as_str().trim_end_matches(','));
            let compact = match compact.strip_prefix("$ ") {
                Some(rest) => format!("${rest}"),
                None => compact,
            };
            (amount.start(), compact)
        })
        .collect();

    ordered_unique(found)
}

fn ordered_unique(mut found: Vec<(usize, String)>) -> Vec<String> {
    found.sort_by_key(|(position, _)| *position);

    let mut values = Vec::with_capacity(found.len());
    for (_, value) in found {
        if !values.contains(&value) {
            values.push(value);
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentence_index_splits_on_terminators_and_blank_lines() {
        let text = "Scope 1 fell 4.5% in 2022. We will act!\n\nNew heading\nmore text";
        let index = SentenceIndex::new(text);

        assert_eq!(index.len(), 3);
        let will = text.find("will").expect("will");
        let bounds = index.sentence_bounds(will, will + 4);
        assert_eq!(text[bounds].trim(), "We will act!");

        let heading = text.find("New").expect("heading");
        let bounds = index.sentence_bounds(heading, heading + 3);
        assert_eq!(text[bounds].trim(), "New heading\nmore text");
    }

    #[test]
    fn quote_stays_within_sentence_and_window() {
        let text = "First sentence here. Our goal is net zero by 2040 across operations. Last one.";
        let sentences = SentenceIndex::new(text);
        let start = text.find("goal").expect("goal");
        let window = ContextWindow {
            window_chars: 200,
            max_quote_chars: 300,
        };

        assert_eq!(
            window.quote(text, &sentences, start, start + 4),
            "Our goal is net zero by 2040 across operations."
        );

        let narrow = ContextWindow {
            window_chars: 4,
            max_quote_chars: 300,
        };
        assert_eq!(narrow.quote(text, &sentences, start, start + 4), "Our goal is");
    }

    #[test]
    fn quote_cap_keeps_the_match_visible() {
        let text = format!("{} pledge {}", "a ".repeat(200), "b ".repeat(200));
        let sentences = SentenceIndex::new(&text);
        let start = text.find("pledge").expect("pledge");
        let window = ContextWindow {
            window_chars: 200,
            max_quote_chars: 40,
        };

        let quote = window.quote(&text, &sentences, start, start + 6);
        assert!(quote.contains("pledge"));
        assert!(quote.chars().count() <= 40);
    }

    #[test]
    fn quote_handles_multibyte_text() {
        let text = "Réduire les émissions – objectif atteint à 100 % d’ici 2030.";
        let sentences = SentenceIndex::new(text);
        let start = text.find("objectif").expect("objectif");
        let window = ContextWindow {
            window_chars: 5,
            max_quote_chars: 300,
        };

        assert_eq!(
            window.quote(text, &sentences, start, start + "objectif".len()),
            "ns – objectif atte"
        );
    }

    #[test]
    fn numeric_values_normalize_and_order() {
        assert_eq!(
            percentages_and_years("30% reduction in emissions by 2030"),
            vec!["30%".to_string(), "2030".to_string()]
        );
        assert_eq!(
            percentages_and_years("by 2030, a 50 % cut; 2019 baseline; again 50% by 2030"),
            vec!["2030".to_string(), "50%".to_string()]
        );
        assert!(percentages_and_years("no figures here").is_empty());
        assert_eq!(percentages_and_years("2025%"), vec!["2025%".to_string()]);
    }

    #[test]
    fn currency_amounts_capture_magnitude() {
        assert_eq!(
            currency_amounts("We invested $ 5 million and later $1,200,000, plus $2.5B."),
            vec![
                "$5 million".to_string(),
                "$1,200,000".to_string(),
                "$2.5B".to_string()
            ]
        );
    }
}
