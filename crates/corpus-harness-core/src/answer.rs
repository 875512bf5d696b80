//! Grounded-answer composition.
//!
//! Everything about an answer that does not involve a language model:
//! building the bounded context block from retrieval hits, the prompts,
//! the mandatory citation block, the refusal used when nothing was
//! retrieved, and the deterministic extractive answer used when no
//! generation backend is usable.
//!
//! # Answer shape
//!
//! Every answer ends with a citation block:
//!
//! ```text
//! <body>
//!
//! **Sources**
//! - [contract.txt | chunk 0]
//! - [contract.txt | chunk 3]
//! ```
//!
//! With zero hits the block reads `No source found.`

use std::sync::OnceLock;

use regex::Regex;

use crate::models::RetrievalHit;

/// Maximum characters of retrieved context sent to a generation backend.
pub const MAX_CONTEXT_CHARS: usize = 6000;

/// Appended when the context was cut at [`MAX_CONTEXT_CHARS`].
pub const TRUNCATION_MARKER: &str = "\n[... context truncated ...]";

/// Separator between context blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Characters of context quoted by the extractive fallback.
pub const EXCERPT_CHARS: usize = 300;

/// Heading of the citation block.
pub const SOURCES_HEADING: &str = "**Sources**";

/// Body used when no source was found.
pub const NO_SOURCE: &str = "No source found.";

/// Fixed response when retrieval returned nothing.
pub const REFUSAL: &str =
    "I could not find this information in the provided documents, so I cannot answer.";

const EXCERPT_INTRO: &str = "Here are the relevant passages found in the supplied documents:";

/// Durations in English and French (`12 months`, `12-month`, `3 semaines`,
/// `1 an`).
const DURATION_PATTERN: &str =
    r"(?i)\b(\d{1,3})(?:\s*|-)(months?|weeks?|days?|years?|mois|semaines?|jours?|ans?)\b";

fn duration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DURATION_PATTERN).expect("duration pattern is valid"))
}

/// Citation label for one hit: `[filename | chunk N]`.
pub fn citation_label(hit: &RetrievalHit) -> String {
    format!("[{} | chunk {}]", hit.meta.filename, hit.meta.chunk_index)
}

/// Concatenate hits into `[filename | chunk N]\n<text>` blocks, cut to
/// [`MAX_CONTEXT_CHARS`] characters. A cut appends [`TRUNCATION_MARKER`].
pub fn build_context(hits: &[RetrievalHit]) -> String {
    let joined = hits
        .iter()
        .map(|h| format!("{}\n{}", citation_label(h), h.text))
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR);

    match joined.char_indices().nth(MAX_CONTEXT_CHARS) {
        Some((cut, _)) => format!("{}{}", &joined[..cut], TRUNCATION_MARKER),
        None => joined,
    }
}

/// System instruction for generation backends.
pub fn system_prompt(language: &str) -> String {
    format!(
        "You are an internal document assistant. Answer ONLY from the supplied context passages. \
         Answer in {language}. If the answer is not present in the context, say so politely and \
         do not guess. End with a \"Sources\" section listing [filename | chunk] for every \
         passage you used."
    )
}

/// User message carrying the context and the question.
pub fn user_prompt(question: &str, context: &str) -> String {
    format!("Context:\n{}\n\nQuestion: {}", context, question)
}

/// The citation block listing every hit, or [`NO_SOURCE`].
pub fn citation_block(hits: &[RetrievalHit]) -> String {
    if hits.is_empty() {
        return format!("{}\n{}", SOURCES_HEADING, NO_SOURCE);
    }
    let lines = hits
        .iter()
        .map(|h| format!("- {}", citation_label(h)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n{}", SOURCES_HEADING, lines)
}

fn is_sources_heading(line: &str) -> bool {
    let heading = line
        .trim()
        .trim_matches(|c: char| c == '*' || c == '#' || c == ':' || c == ' ')
        .to_lowercase();
    heading == "sources" || heading == "source"
}

fn is_citation_line(line: &str) -> bool {
    let line = line.trim();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line);
    line.starts_with('[') && line.ends_with(']')
}

/// Remove a trailing "Sources" section a model may have written itself.
///
/// Only a heading followed by nothing but blank or citation lines counts;
/// a heading with prose after it is left alone.
fn strip_model_sources(body: &str) -> &str {
    let mut end = body.len();
    for line in body.split_inclusive('\n').rev() {
        let start = end - line.len();
        if is_sources_heading(line) {
            return &body[..start];
        }
        if !line.trim().is_empty() && !is_citation_line(line) {
            return body;
        }
        end = start;
    }
    body
}

/// Append the authoritative citation block to a body.
pub fn with_citations(body: &str, hits: &[RetrievalHit]) -> String {
    format!(
        "{}\n\n{}",
        strip_model_sources(body).trim_end(),
        citation_block(hits)
    )
}

/// The fixed response for an empty hit set.
pub fn refusal() -> String {
    with_citations(REFUSAL, &[])
}

/// Deterministic answer built only from the hit texts.
///
/// Surfaces the first duration expression verbatim if one exists,
/// otherwise quotes the first [`EXCERPT_CHARS`] characters of the joined
/// hits. Always ends with the citation block.
pub fn extractive_answer(hits: &[RetrievalHit]) -> String {
    if hits.is_empty() {
        return refusal();
    }

    let joined = hits
        .iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let body = match duration_regex().captures(&joined) {
        Some(caps) => format!(
            "The stated duration is **{} {}**.",
            &caps[1],
            caps[2].to_lowercase()
        ),
        None => {
            let excerpt = match joined.char_indices().nth(EXCERPT_CHARS) {
                Some((cut, _)) => format!("{}…", &joined[..cut]),
                None => joined.clone(),
            };
            format!("{}\n\n{}", EXCERPT_INTRO, excerpt)
        }
    };

    with_citations(&body, hits)
}

/// Parse `(filename, chunk_index)` pairs back out of an answer's citation
/// block. Returns an empty list when the block says no source was found.
pub fn cited_sources(answer: &str) -> Vec<(String, usize)> {
    let Some(start) = answer.rfind(SOURCES_HEADING) else {
        return Vec::new();
    };
    answer[start + SOURCES_HEADING.len()..]
        .lines()
        .filter_map(|line| {
            let inner = line.trim().strip_prefix("- [")?.strip_suffix(']')?;
            let (filename, chunk) = inner.rsplit_once(" | chunk ")?;
            Some((filename.to_string(), chunk.parse().ok()?))
        })
        .collect()
}
