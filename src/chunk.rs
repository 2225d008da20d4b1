//! Sentence-aligned text chunker with trailing overlap.
//!
//! Splits lesson bodies into chunks that respect a configurable
//! `chunk_size` (in characters). Splitting happens only on sentence
//! boundaries, and each chunk after the first is seeded with whole
//! sentences from the end of the previous chunk so that context carries
//! across chunk edges.
//!
//! # Algorithm
//!
//! 1. Collapse whitespace runs to single spaces.
//! 2. Split into sentences on `.`, `!`, `?` followed by a space and an
//!    uppercase letter, except after initials and abbreviations
//!    (`J.`, `Dr.`, `U.S.`, `e.g.`).
//! 3. Accumulate sentences until adding the next one would exceed
//!    `chunk_size`, then emit the chunk.
//! 4. Walk backward over the emitted chunk collecting whole sentences
//!    until `chunk_overlap` characters are met or exceeded; those
//!    sentences open the next chunk. Overlap sentences are dropped, oldest
//!    first, until the next new sentence fits alongside them.
//! 5. A sentence longer than `chunk_size` becomes a chunk on its own.
//!
//! # Example
//!
//! ```rust
//! use course_rag::chunk::{chunk_text, ChunkSettings};
//!
//! let settings = ChunkSettings { chunk_size: 800, chunk_overlap: 100 };
//! let chunks = chunk_text("First sentence. Second sentence.", &settings);
//! assert_eq!(chunks, vec!["First sentence. Second sentence.".to_string()]);
//! ```

/// Chunk sizing, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

/// Abbreviations (lowercase, without the trailing period) after which a
/// period never ends a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "inc", "ltd", "corp", "dept", "fig",
    "approx", "no",
];

/// Split `text` into chunks of whole sentences.
///
/// Returns an empty vector for blank input.
pub fn chunk_text(text: &str, settings: &ChunkSettings) -> Vec<String> {
    chunk_sentences(&split_sentences(text), settings)
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into sentences.
///
/// The text is whitespace-normalized first, so joining the returned
/// sentences with single spaces reproduces [`normalize_whitespace`]'s
/// output exactly.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    let chars: Vec<(usize, char)> = normalized.char_indices().collect();

    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if matches!(c, '.' | '!' | '?') {
            let mut end = i + 1;
            while end < chars.len() && is_closer(chars[end].1) {
                end += 1;
            }
            let boundary = end + 1 < chars.len()
                && chars[end].1 == ' '
                && chars[end + 1].1.is_uppercase();
            if boundary && !(c == '.' && ends_with_abbreviation(&normalized[start..pos])) {
                sentences.push(normalized[start..chars[end].0].to_string());
                start = chars[end + 1].0;
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }

    let tail = &normalized[start..];
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Group sentences into chunks with trailing overlap.
pub fn chunk_sentences(sentences: &[String], settings: &ChunkSettings) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < sentences.len() {
        let mut end = start;
        let mut size = 0usize;
        while end < sentences.len() {
            let addition = char_len(&sentences[end]) + usize::from(end > start);
            if size + addition > settings.chunk_size && end > start {
                break;
            }
            size += addition;
            end += 1;
        }

        chunks.push(sentences[start..end].join(" "));
        if end >= sentences.len() {
            break;
        }

        let mut overlap = overlap_count(&sentences[start..end], settings.chunk_overlap);
        // The next chunk must hold at least one new sentence after its overlap.
        while overlap > 0
            && joined_len(&sentences[end - overlap..end]) + 1 + char_len(&sentences[end])
                > settings.chunk_size
        {
            overlap -= 1;
        }
        start = end - overlap;
    }

    chunks
}

/// Number of trailing sentences of `emitted` that seed the next chunk.
///
/// Never returns `emitted.len()` or more, so the chunker always advances.
fn overlap_count(emitted: &[String], budget: usize) -> usize {
    if budget == 0 {
        return 0;
    }
    let mut size = 0usize;
    let mut count = 0usize;
    for sentence in emitted.iter().rev().take(emitted.len().saturating_sub(1)) {
        size += char_len(sentence) + usize::from(count > 0);
        count += 1;
        if size >= budget {
            break;
        }
    }
    count
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Length of `sentences` joined with single spaces.
fn joined_len(sentences: &[String]) -> usize {
    sentences.iter().map(|s| char_len(s)).sum::<usize>() + sentences.len().saturating_sub(1)
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}')
}

/// Whether the token right before a period makes it a non-terminal period.
///
/// `preceding` is the current sentence up to (not including) the period.
fn ends_with_abbreviation(preceding: &str) -> bool {
    let token = preceding
        .rsplit(' ')
        .next()
        .unwrap_or("")
        .trim_start_matches(|c: char| matches!(c, '(' | '"' | '\'' | '[' | '\u{201C}'));
    let chars: Vec<char> = token.chars().collect();

    match chars.as_slice() {
        [] => false,
        // Initial: "J. Smith"
        [c] => c.is_alphabetic(),
        // Short title: "Dr. Ng", "St. Louis". Also catches any two-letter
        // capitalised word ("We use Go. Next"), so no split happens there.
        [a, b] if a.is_uppercase() && b.is_lowercase() => true,
        // Dotted abbreviation: "U.S. Army", "e.g. Python"
        [.., x, '.', y] if x.is_alphanumeric() && y.is_alphanumeric() => true,
        _ => ABBREVIATIONS.contains(&token.to_lowercase().as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(size: usize, overlap: usize) -> ChunkSettings {
        ChunkSettings {
            chunk_size: size,
            chunk_overlap: overlap,
        }
    }

    #[test]
    fn splits_on_terminal_punctuation() {
        let s = split_sentences("One is here. Two is here! Three is here? Four");
        assert_eq!(s, vec!["One is here.", "Two is here!", "Three is here?", "Four"]);
    }

    #[test]
    fn requires_capital_after_boundary() {
        let s = split_sentences("Version 2. and more. Then done.");
        assert_eq!(s, vec!["Version 2. and more.", "Then done."]);
    }

    #[test]
    fn keeps_initials_and_abbreviations_together() {
        let s = split_sentences(
            "Dr. Ng taught with J. Smith in the U.S. Army base. Prof. Lee joined e.g. Python work. Done.",
        );
        assert_eq!(
            s,
            vec![
                "Dr. Ng taught with J. Smith in the U.S. Army base.",
                "Prof. Lee joined e.g. Python work.",
                "Done."
            ]
        );
    }

    #[test]
    fn closing_quote_stays_with_sentence() {
        let s = split_sentences("He said \"stop.\" Then left.");
        assert_eq!(s, vec!["He said \"stop.\"", "Then left."]);
    }

    #[test]
    fn whitespace_is_normalized() {
        let s = split_sentences("  First   line.\n\nSecond\tline.  ");
        assert_eq!(s, vec!["First line.", "Second line."]);
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(chunk_text("   \n ", &settings(800, 100)).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("Alpha beta. Gamma delta.", &settings(800, 100));
        assert_eq!(chunks, vec!["Alpha beta. Gamma delta."]);
    }

    #[test]
    fn chunks_respect_size_and_overlap_is_whole_sentences() {
        let text = (0..40)
            .map(|i| format!("Sentence number {:02} talks about item {:02}.", i, i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, &settings(200, 50));
        assert!(chunks.len() > 1);

        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200, "oversized chunk: {}", chunk);
        }
        for pair in chunks.windows(2) {
            let prev_sentences = split_sentences(&pair[0]);
            let next_first = &split_sentences(&pair[1])[0];
            assert!(
                prev_sentences.contains(next_first),
                "next chunk does not start with a sentence of the previous chunk"
            );
            assert_ne!(&prev_sentences[0], next_first, "chunker did not advance");
        }
    }

    #[test]
    fn overlap_meets_or_exceeds_budget() {
        // Each sentence is 28 chars; a budget of 40 needs two of them.
        let sentences: Vec<String> = (0..10)
            .map(|i| format!("This is sentence number {:03}.", i))
            .collect();
        assert_eq!(sentences[0].chars().count(), 28);
        let chunks = chunk_sentences(&sentences, &settings(100, 40));
        // 3 sentences fit per chunk (28*3 + 2 = 86); overlap takes 2.
        assert_eq!(split_sentences(&chunks[0]).len(), 3);
        assert_eq!(split_sentences(&chunks[1])[0], sentences[1]);
    }

    #[test]
    fn oversized_sentence_is_its_own_chunk() {
        let long = format!("{}.", "x".repeat(300));
        let text = format!("Short one. {} Another short.", long.replace('x', "Y"));
        let chunks = chunk_text(&text, &settings(100, 20));
        assert!(chunks.iter().any(|c| c.starts_with("YYYY")));
        assert_eq!(chunks.last().unwrap(), "Another short.");
    }

    #[test]
    fn zero_overlap_partitions_sentences() {
        let text = (0..20)
            .map(|i| format!("Item {:02} is listed.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, &settings(60, 0));
        assert_eq!(chunks.join(" "), normalize_whitespace(&text));
    }

    #[test]
    fn deterministic() {
        let text = "Alpha one. Beta two. Gamma three. Delta four. Epsilon five.";
        assert_eq!(
            chunk_text(text, &settings(25, 10)),
            chunk_text(text, &settings(25, 10))
        );
    }

    fn sentence_of(lead: char, len: usize) -> String {
        format!("{}{}.", lead, "a".repeat(len - 2))
    }

    #[test]
    fn overlap_is_dropped_when_it_would_crowd_out_new_text() {
        let sentences = vec![
            sentence_of('A', 599),
            sentence_of('B', 149),
            sentence_of('C', 699),
        ];
        let chunks = chunk_sentences(&sentences, &settings(800, 100));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{} {}", sentences[0], sentences[1]));
        assert_eq!(chunks[1], sentences[2]);
    }

    #[test]
    fn every_chunk_adds_new_sentences_and_covers_the_text() {
        let lengths = [599, 149, 699, 90, 60, 720, 30, 30, 30, 400];
        let sentences: Vec<String> = lengths
            .iter()
            .enumerate()
            .map(|(i, &len)| sentence_of((b'A' + i as u8) as char, len))
            .collect();
        let chunks = chunk_sentences(&sentences, &settings(800, 100));

        let mut covered: Vec<String> = Vec::new();
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 800);
            let parts = split_sentences(chunk);
            let new: Vec<String> = parts
                .iter()
                .skip_while(|s| covered.contains(s))
                .cloned()
                .collect();
            assert!(!new.is_empty(), "chunk holds only overlap: {:.40}", chunk);
            covered.extend(new);
        }
        assert_eq!(covered, sentences);
    }

    #[test]
    fn two_letter_capitalised_word_does_not_end_a_sentence() {
        let s = split_sentences("We use Go. Next we test.");
        assert_eq!(s, vec!["We use Go. Next we test."]);
    }
}
