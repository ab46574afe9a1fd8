//! Citation handling for grounded web research results.
//!
//! Grounded responses come back with a list of source chunks and a list of
//! supports (text spans backed by chunk indices). These helpers turn that into
//! [`Citation`]s, replace long source URLs by short placeholder URLs, and
//! insert markdown citation markers into the summary text.

use std::collections::{HashMap, HashSet};

use crate::llm::{GroundingChunk, GroundingMetadata};
use crate::models::{Citation, Message, Role, SourceSegment};

/// Prefix of the placeholder URLs inserted into summaries
pub const SHORT_URL_PREFIX: &str = "https://vertexaisearch.cloud.google.com/id/";

/// Research topic for a conversation
///
/// A single message is used as-is; longer conversations are rendered as a
/// `User:` / `Assistant:` transcript.
pub fn get_research_topic(messages: &[Message]) -> String {
    if let [only] = messages {
        return only.content.clone();
    }

    messages
        .iter()
        .map(|message| match message.role {
            Role::Human => format!("User: {}\n", message.content),
            Role::Assistant => format!("Assistant: {}\n", message.content),
        })
        .collect()
}

/// Map each distinct chunk URI to a short placeholder URL
///
/// The placeholder is `{SHORT_URL_PREFIX}{id}-{idx}` where `idx` is the
/// position of the URI's first occurrence in `chunks`.
pub fn resolve_urls(chunks: &[GroundingChunk], id: usize) -> HashMap<String, String> {
    let mut resolved = HashMap::new();

    for (idx, chunk) in chunks.iter().enumerate() {
        let Some(web) = &chunk.web else {
            continue;
        };
        resolved
            .entry(web.uri.clone())
            .or_insert_with(|| format!("{}{}-{}", SHORT_URL_PREFIX, id, idx));
    }

    resolved
}

/// Site label from a chunk title: the part before the first `.`
///
/// Titles without a `.` yield no label.
fn source_label(title: &str) -> Option<String> {
    title
        .split_once('.')
        .map(|(label, _)| label.to_string())
}

/// Build citations from grounding metadata
///
/// Supports without a segment or without an end index are skipped; a missing
/// start index counts as 0. Chunk references that are out of range, have no
/// web information, or have a title without a `.` are dropped from the
/// citation's segments.
pub fn get_citations(
    grounding: Option<&GroundingMetadata>,
    resolved_urls: &HashMap<String, String>,
) -> Vec<Citation> {
    let Some(grounding) = grounding else {
        return Vec::new();
    };

    let mut citations = Vec::new();

    for support in &grounding.grounding_supports {
        let Some(segment) = &support.segment else {
            continue;
        };
        let Some(end_index) = segment.end_index else {
            continue;
        };

        let segments = support
            .grounding_chunk_indices
            .iter()
            .filter_map(|&idx| grounding.grounding_chunks.get(idx))
            .filter_map(|chunk| chunk.web.as_ref())
            .filter_map(|web| {
                let label = source_label(&web.title)?;
                Some(SourceSegment {
                    label,
                    short_url: resolved_urls.get(&web.uri).cloned().unwrap_or_default(),
                    value: web.uri.clone(),
                })
            })
            .collect();

        citations.push(Citation {
            start_index: segment.start_index.unwrap_or(0),
            end_index,
            segments,
        });
    }

    citations
}

/// Insert ` [label](short_url)` markers at the end of each cited span
///
/// Citations are applied from the end of the text backwards so earlier
/// indices stay valid. Indices are UTF-8 byte offsets; out-of-range indices
/// are clamped and indices inside a character move back to its start.
pub fn insert_citation_markers(text: &str, citations: &[Citation]) -> String {
    let mut sorted: Vec<&Citation> = citations.iter().collect();
    sorted.sort_by(|a, b| {
        (b.end_index, b.start_index).cmp(&(a.end_index, a.start_index))
    });

    let mut modified = text.to_string();

    for citation in sorted {
        let marker: String = citation
            .segments
            .iter()
            .map(|segment| format!(" [{}]({})", segment.label, segment.short_url))
            .collect();

        let at = floor_char_boundary(&modified, citation.end_index);
        modified.insert_str(at, &marker);
    }

    modified
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Flatten the sources of all citations, in citation order
pub fn gathered_sources(citations: &[Citation]) -> Vec<SourceSegment> {
    citations
        .iter()
        .flat_map(|citation| citation.segments.iter().cloned())
        .collect()
}

/// Replace short URLs in `answer` by their original URLs
///
/// Returns the rewritten answer and the sources it cites, in gathered order
/// with one entry per short URL. Longer short URLs are replaced first since
/// `.../id/0-1` is a prefix of `.../id/0-10`.
pub fn replace_short_urls(answer: &str, sources: &[SourceSegment]) -> (String, Vec<SourceSegment>) {
    let mut by_length: Vec<&SourceSegment> = sources
        .iter()
        .filter(|source| !source.short_url.is_empty())
        .collect();
    by_length.sort_by(|a, b| b.short_url.len().cmp(&a.short_url.len()));

    let mut answer = answer.to_string();
    let mut cited: HashSet<&str> = HashSet::new();
    for source in by_length {
        if cited.contains(source.short_url.as_str()) || !answer.contains(&source.short_url) {
            continue;
        }
        answer = answer.replace(&source.short_url, &source.value);
        cited.insert(&source.short_url);
    }

    let mut unique_sources: Vec<SourceSegment> = Vec::new();
    for source in sources {
        if cited.contains(source.short_url.as_str())
            && !unique_sources.iter().any(|s| s.short_url == source.short_url)
        {
            unique_sources.push(source.clone());
        }
    }

    (answer, unique_sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GroundingSupport;

    fn sample_grounding() -> GroundingMetadata {
        GroundingMetadata {
            grounding_chunks: vec![
                GroundingChunk::web("https://redirect/a", "wikipedia.org"),
                GroundingChunk::web("https://redirect/b", "rust-lang.org"),
                GroundingChunk::web("https://redirect/a", "wikipedia.org"),
                GroundingChunk::web("https://redirect/c", "no-dot-title"),
            ],
            grounding_supports: vec![
                GroundingSupport::new(0, 10, vec![0, 1]),
                GroundingSupport::new(11, 20, vec![3, 42]),
            ],
            web_search_queries: vec![],
        }
    }

    #[test]
    fn test_research_topic_single_message() {
        let messages = vec![Message::human("What is Rust?")];
        assert_eq!(get_research_topic(&messages), "What is Rust?");
    }

    #[test]
    fn test_research_topic_conversation() {
        let messages = vec![
            Message::human("What is Rust?"),
            Message::assistant("A language."),
            Message::human("Who made it?"),
        ];
        assert_eq!(
            get_research_topic(&messages),
            "User: What is Rust?\nAssistant: A language.\nUser: Who made it?\n"
        );
    }

    #[test]
    fn test_resolve_urls_keeps_first_occurrence() {
        let grounding = sample_grounding();
        let resolved = resolve_urls(&grounding.grounding_chunks, 7);

        assert_eq!(resolved.len(), 3);
        assert_eq!(
            resolved["https://redirect/a"],
            "https://vertexaisearch.cloud.google.com/id/7-0"
        );
        assert_eq!(
            resolved["https://redirect/b"],
            "https://vertexaisearch.cloud.google.com/id/7-1"
        );
        assert_eq!(
            resolved["https://redirect/c"],
            "https://vertexaisearch.cloud.google.com/id/7-3"
        );
    }

    #[test]
    fn test_get_citations() {
        let grounding = sample_grounding();
        let resolved = resolve_urls(&grounding.grounding_chunks, 0);
        let citations = get_citations(Some(&grounding), &resolved);

        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].start_index, 0);
        assert_eq!(citations[0].end_index, 10);
        assert_eq!(citations[0].segments.len(), 2);
        assert_eq!(citations[0].segments[0].label, "wikipedia");
        assert_eq!(citations[0].segments[0].value, "https://redirect/a");
        assert_eq!(citations[0].segments[1].label, "rust-lang");

        // Title without a dot and an out-of-range index are both dropped
        assert!(citations[1].segments.is_empty());
    }

    #[test]
    fn test_get_citations_skips_incomplete_supports() {
        let mut grounding = sample_grounding();
        grounding.grounding_supports = vec![
            GroundingSupport {
                segment: None,
                grounding_chunk_indices: vec![0],
                confidence_scores: vec![],
            },
            GroundingSupport {
                segment: Some(crate::llm::Segment {
                    start_index: None,
                    end_index: Some(5),
                    text: String::new(),
                }),
                grounding_chunk_indices: vec![1],
                confidence_scores: vec![],
            },
            GroundingSupport {
                segment: Some(crate::llm::Segment {
                    start_index: Some(1),
                    end_index: None,
                    text: String::new(),
                }),
                grounding_chunk_indices: vec![1],
                confidence_scores: vec![],
            },
        ];

        let citations = get_citations(Some(&grounding), &HashMap::new());
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].start_index, 0);
        assert_eq!(citations[0].end_index, 5);
        assert_eq!(citations[0].segments[0].short_url, "");

        assert!(get_citations(None, &HashMap::new()).is_empty());
    }

    #[test]
    fn test_insert_citation_markers() {
        let segment = |label: &str, n: usize| SourceSegment {
            label: label.to_string(),
            short_url: format!("https://s/{}", n),
            value: format!("https://long/{}", n),
        };

        let text = "Rust is fast. Rust is safe.";
        let citations = vec![
            Citation {
                start_index: 0,
                end_index: 13,
                segments: vec![segment("a", 0)],
            },
            Citation {
                start_index: 14,
                end_index: 27,
                segments: vec![segment("b", 1), segment("c", 2)],
            },
        ];

        let marked = insert_citation_markers(text, &citations);
        assert_eq!(
            marked,
            "Rust is fast. [a](https://s/0) Rust is safe. [b](https://s/1) [c](https://s/2)"
        );
    }

    #[test]
    fn test_insert_citation_markers_clamps_indices() {
        let citations = vec![Citation {
            start_index: 0,
            end_index: 2,
            segments: vec![SourceSegment {
                label: "x".to_string(),
                short_url: "u".to_string(),
                value: "v".to_string(),
            }],
        }];

        // Index 2 falls inside the two-byte 'é'
        assert_eq!(insert_citation_markers("né", &citations), "n [x](u)é");

        let past_end = vec![Citation {
            end_index: 100,
            ..citations[0].clone()
        }];
        assert_eq!(insert_citation_markers("abc", &past_end), "abc [x](u)");
    }

    #[test]
    fn test_insert_citation_markers_same_end_index() {
        let segment = |label: &str, n: usize| SourceSegment {
            label: label.to_string(),
            short_url: format!("https://s/{}", n),
            value: format!("https://long/{}", n),
        };
        let whole = Citation {
            start_index: 0,
            end_index: 13,
            segments: vec![segment("a", 0)],
        };
        let tail = Citation {
            start_index: 5,
            end_index: 13,
            segments: vec![segment("b", 1)],
        };

        // The citation starting earlier ends up first, whatever the input order
        let expected = "Rust is fast. [a](https://s/0) [b](https://s/1)";
        let text = "Rust is fast.";
        assert_eq!(
            insert_citation_markers(text, &[whole.clone(), tail.clone()]),
            expected
        );
        assert_eq!(insert_citation_markers(text, &[tail, whole]), expected);
    }

    #[test]
    fn test_replace_short_urls_with_shared_prefix() {
        let source = |short: &str, value: &str| SourceSegment {
            label: "site".to_string(),
            short_url: format!("{}{}", SHORT_URL_PREFIX, short),
            value: value.to_string(),
        };
        let sources = vec![
            source("0-1", "https://a.example/page"),
            source("0-10", "https://b.example/page"),
            source("0-2", "https://c.example/page"),
        ];
        let answer = format!(
            "A [a]({p}0-1) and B [b]({p}0-10).",
            p = SHORT_URL_PREFIX
        );

        let (answer, cited) = replace_short_urls(&answer, &sources);
        assert_eq!(
            answer,
            "A [a](https://a.example/page) and B [b](https://b.example/page)."
        );
        let values: Vec<&str> = cited.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(values, vec!["https://a.example/page", "https://b.example/page"]);
    }

    #[test]
    fn test_replace_short_urls_only_longer_cited() {
        let sources = vec![
            SourceSegment {
                label: "a".to_string(),
                short_url: format!("{}3-1", SHORT_URL_PREFIX),
                value: "https://a.example/".to_string(),
            },
            SourceSegment {
                label: "b".to_string(),
                short_url: format!("{}3-12", SHORT_URL_PREFIX),
                value: "https://b.example/".to_string(),
            },
        ];
        let answer = format!("Only B [b]({}3-12).", SHORT_URL_PREFIX);

        let (answer, cited) = replace_short_urls(&answer, &sources);
        assert_eq!(answer, "Only B [b](https://b.example/).");
        assert_eq!(cited.len(), 1);
        assert_eq!(cited[0].label, "b");
    }
}
