//! Keyword snippets for light extraction.

const SNIPPET_SENTENCES: usize = 5;
const SNIPPET_MAX_CHARS: usize = 500;
const SNIPPET_MIN_CUT: usize = 200;
const FALLBACK_SENTENCES: usize = 3;
const FALLBACK_MAX_CHARS: usize = 300;
const FALLBACK_MIN_CUT: usize = 100;

/// Split text after `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next, ws)) = chars.peek() {
                if ws.is_whitespace() {
                    let sentence = text[start..next].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    while let Some(&(_, ws)) = chars.peek() {
                        if !ws.is_whitespace() {
                            break;
                        }
                        chars.next();
                    }
                    start = chars.peek().map(|&(j, _)| j).unwrap_or(text.len());
                }
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Sentences mentioning any keyword, with one sentence of context either
/// side, up to five sentences and about 500 characters. Without a keyword
/// hit the first three sentences are used instead, capped near 300.
pub fn build_snippet(text: &str, keywords: &[String]) -> String {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return String::new();
    }
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let mut picked: Vec<usize> = Vec::new();
    for (i, sentence) in sentences.iter().enumerate() {
        let lowered = sentence.to_lowercase();
        if !keywords.iter().any(|k| lowered.contains(k.as_str())) {
            continue;
        }
        if i > 0 && !picked.contains(&(i - 1)) {
            picked.push(i - 1);
        }
        if !picked.contains(&i) {
            picked.push(i);
        }
        if i + 1 < sentences.len() && picked.len() < SNIPPET_SENTENCES {
            picked.push(i + 1);
        }
        if picked.len() >= SNIPPET_SENTENCES {
            break;
        }
    }

    if picked.is_empty() {
        let joined = sentences[..sentences.len().min(FALLBACK_SENTENCES)].join(" ");
        return cut_at_sentence(&joined, FALLBACK_MAX_CHARS, FALLBACK_MIN_CUT);
    }

    let joined = picked
        .iter()
        .map(|&i| sentences[i])
        .collect::<Vec<_>>()
        .join(" ");
    cut_at_sentence(&joined, SNIPPET_MAX_CHARS, SNIPPET_MIN_CUT)
}

/// Trim to `max` chars, preferring to end on a sentence boundary past `min_cut`.
fn cut_at_sentence(text: &str, max: usize, min_cut: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let end = text.char_indices().nth(max).map(|(i, _)| i).unwrap_or(text.len());
    let head = &text[..end];
    for punct in [". ", "! ", "? "] {
        if let Some(pos) = head.rfind(punct) {
            if head[..pos].chars().count() > min_cut {
                return head[..=pos].to_string();
            }
        }
    }
    head.to_string()
}
