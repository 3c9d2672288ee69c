//! Scene chunking for screenplay snapshots.
//!
//! This module turns a [`DocumentSnapshot`] into the retrieval units stored in the
//! similarity index. The natural unit of a screenplay is the scene, so a chunk is
//! everything from one scene heading up to (but not including) the next.
//!
//! ## Rules
//!
//! - A heading line whose `ends_element` marker is set closes a heading element and
//!   opens a new scene. Wrapped heading lines before it belong to the same scene.
//! - Lines before the first heading (title page leftovers, notes) are not part of any
//!   scene.
//! - Chunk text is the scene's lines joined with `\n`, untouched.
//! - Scenes whose text is empty or whitespace only are dropped.
//! - Documents with fewer than [`MIN_CONTENT_CHARS`] non-whitespace characters are
//!   treated as placeholders and produce no chunks at all.
//! - A document with enough content but no usable scenes produces exactly one
//!   fallback chunk covering every line, headed [`FALLBACK_HEADING`].
//!
//! Chunk ids are a function of the scene number and a digest of the first
//! [`ID_DIGEST_CHARS`] characters of the chunk text, so rechunking identical content
//! yields identical ids.
//!
//! ```
//! use scribe_ai_context::{Chunker, DocumentSnapshot, LineType, ScriptLine};
//!
//! let doc = DocumentSnapshot::new(vec![
//!     ScriptLine::new(LineType::Heading, "INT. LIGHTHOUSE - NIGHT"),
//!     ScriptLine::new(LineType::Action, "The lamp turns. Waves break hard against the rocks below the tower."),
//!     ScriptLine::new(LineType::CharacterName, "ODA"),
//!     ScriptLine::new(LineType::Dialogue, "Storm's early this year. Nobody sails tonight."),
//! ]);
//!
//! let chunks = Chunker::default().chunk(&doc);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].metadata.heading.as_deref(), Some("INT. LIGHTHOUSE - NIGHT"));
//! assert!(chunks[0].metadata.has_dialogue_line);
//! ```

use crate::document::{DocumentSnapshot, LineType, ScriptLine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Heading used for the single chunk produced when a document has no scenes.
pub const FALLBACK_HEADING: &str = "<entire document>";

/// Minimum non-whitespace characters for a document to be worth indexing.
pub const MIN_CONTENT_CHARS: usize = 100;

/// Number of leading chunk characters that feed the chunk id digest.
pub const ID_DIGEST_CHARS: usize = 50;

/// Metadata stored next to every chunk in the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// 1-based scene number in document order
    pub sequence_number: usize,
    /// Scene heading text, or [`FALLBACK_HEADING`]
    pub heading: Option<String>,
    /// Inclusive (start, end) line indexes into the snapshot
    pub line_range: (usize, usize),
    pub has_character_line: bool,
    pub has_dialogue_line: bool,
    pub has_action_line: bool,
    /// Distinct character cues in the scene, sorted, extensions like "(V.O.)" removed
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub word_count: usize,
}

/// A retrieval unit: one scene (or the whole document as a fallback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Tunables for the chunker.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub min_content_chars: usize,
    pub id_digest_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_content_chars: MIN_CONTENT_CHARS,
            id_digest_chars: ID_DIGEST_CHARS,
        }
    }
}

/// Splits snapshots into scene chunks. Pure; never fails.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk a snapshot into scenes.
    ///
    /// Returns an empty list only for placeholder documents (below the minimum
    /// content threshold). Any other document yields at least one chunk.
    pub fn chunk(&self, snapshot: &DocumentSnapshot) -> Vec<Chunk> {
        if snapshot.content_chars() < self.config.min_content_chars {
            return Vec::new();
        }

        let lines = snapshot.lines();
        let starts = scene_starts(lines);
        let mut chunks = Vec::with_capacity(starts.len());

        for (index, &start) in starts.iter().enumerate() {
            let end = starts.get(index + 1).copied().unwrap_or(lines.len());
            let scene = &lines[start..end];
            let text = join_lines(scene);
            if text.trim().is_empty() {
                continue;
            }
            chunks.push(self.build_chunk(index + 1, heading_text(scene), start, scene, text));
        }

        if chunks.is_empty() {
            let text = join_lines(lines);
            chunks.push(self.build_chunk(
                1,
                Some(FALLBACK_HEADING.to_string()),
                0,
                lines,
                text,
            ));
        }

        chunks
    }

    fn build_chunk(
        &self,
        sequence_number: usize,
        heading: Option<String>,
        start: usize,
        scene: &[ScriptLine],
        text: String,
    ) -> Chunk {
        let mut metadata = ChunkMetadata {
            sequence_number,
            heading,
            line_range: (start, start + scene.len().saturating_sub(1)),
            has_character_line: false,
            has_dialogue_line: false,
            has_action_line: false,
            characters: Vec::new(),
            word_count: text.split_whitespace().count(),
        };

        let mut characters = BTreeSet::new();
        for line in scene {
            match line.line_type {
                LineType::CharacterName => {
                    metadata.has_character_line = true;
                    let name = strip_extension(&line.text);
                    if !name.is_empty() {
                        characters.insert(name.to_string());
                    }
                }
                LineType::Dialogue => metadata.has_dialogue_line = true,
                LineType::Action => metadata.has_action_line = true,
                _ => {}
            }
        }
        metadata.characters = characters.into_iter().collect();

        Chunk {
            id: chunk_id(sequence_number, &text, self.config.id_digest_chars),
            text,
            metadata,
        }
    }
}

/// Chunk with the default configuration.
pub fn chunk(snapshot: &DocumentSnapshot) -> Vec<Chunk> {
    Chunker::default().chunk(snapshot)
}

/// Deterministic id from the scene number and a digest of the text prefix.
pub fn chunk_id(sequence_number: usize, text: &str, digest_chars: usize) -> String {
    let prefix: String = text.chars().take(digest_chars).collect();
    let digest = blake3::hash(prefix.as_bytes());
    format!(
        "scene-{sequence_number}-{}",
        &hex::encode(digest.as_bytes())[..16]
    )
}

/// First line index of every scene, in order.
fn scene_starts(lines: &[ScriptLine]) -> Vec<usize> {
    let mut starts = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if !line.is_scene_boundary() {
            continue;
        }
        // Pull in wrapped heading lines that belong to this element
        let mut start = index;
        while start > 0
            && lines[start - 1].line_type == LineType::Heading
            && !lines[start - 1].ends_element
        {
            start -= 1;
        }
        starts.push(start);
    }
    starts
}

fn heading_text(scene: &[ScriptLine]) -> Option<String> {
    let mut parts = Vec::new();
    for line in scene {
        if line.line_type != LineType::Heading {
            break;
        }
        parts.push(line.text.trim());
        if line.ends_element {
            break;
        }
    }
    let heading = parts.join(" ");
    if heading.is_empty() {
        None
    } else {
        Some(heading)
    }
}

fn join_lines(lines: &[ScriptLine]) -> String {
    lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_extension(cue: &str) -> &str {
    match cue.find('(') {
        Some(pos) => cue[..pos].trim(),
        None => cue.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(heading: &str, action: &str, who: &str, line: &str) -> Vec<ScriptLine> {
        vec![
            ScriptLine::new(LineType::Heading, heading),
            ScriptLine::new(LineType::Action, action),
            ScriptLine::new(LineType::CharacterName, who),
            ScriptLine::new(LineType::Dialogue, line),
        ]
    }

    fn three_scene_doc() -> DocumentSnapshot {
        let mut lines = Vec::new();
        lines.extend(scene(
            "INT. KITCHEN - NIGHT",
            "Rain streaks the window. A kettle screams.",
            "MARA",
            "The weather's turning. We should leave before the roads flood.",
        ));
        lines.extend(scene(
            "EXT. HARBOUR - DAWN",
            "Fishing boats knock together in the swell.",
            "JONAH (V.O.)",
            "Every boat in this harbour belonged to my father once.",
        ));
        lines.extend(scene(
            "INT. CAR - CONTINUOUS",
            "Wipers fight a losing battle.",
            "MARA",
            "Just drive. Don't look back at the house.",
        ));
        DocumentSnapshot::new(lines)
    }

    #[test]
    fn test_one_chunk_per_scene() {
        let chunks = chunk(&three_scene_doc());

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks[0].metadata.heading.as_deref(),
            Some("INT. KITCHEN - NIGHT")
        );
        assert_eq!(chunks[0].metadata.line_range, (0, 3));
        assert_eq!(chunks[1].metadata.line_range, (4, 7));
        assert_eq!(chunks[2].metadata.line_range, (8, 11));
        assert_eq!(
            chunks.iter().map(|c| c.metadata.sequence_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_chunk_text_is_untransformed() {
        let doc = three_scene_doc();
        let chunks = chunk(&doc);
        let expected: Vec<&str> = doc.lines()[0..4].iter().map(|l| l.text.as_str()).collect();
        assert_eq!(chunks[0].text, expected.join("\n"));
    }

    #[test]
    fn test_metadata_flags_and_characters() {
        let chunks = chunk(&three_scene_doc());
        let harbour = &chunks[1].metadata;

        assert!(harbour.has_action_line);
        assert!(harbour.has_character_line);
        assert!(harbour.has_dialogue_line);
        assert_eq!(harbour.characters, vec!["JONAH".to_string()]);
        assert!(harbour.word_count > 10);
    }

    #[test]
    fn test_flags_false_when_type_absent() {
        let doc = DocumentSnapshot::new(vec![
            ScriptLine::new(LineType::Heading, "EXT. DESERT - NOON"),
            ScriptLine::new(
                LineType::Action,
                "Heat shimmer over endless dunes. A lone rider crests the ridge and stops to drink. The horse snorts.",
            ),
            ScriptLine::new(LineType::Transition, "CUT TO:"),
        ]);
        let chunks = chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].metadata.has_action_line);
        assert!(!chunks[0].metadata.has_character_line);
        assert!(!chunks[0].metadata.has_dialogue_line);
    }

    #[test]
    fn test_ids_are_deterministic() {
        let first = chunk(&three_scene_doc());
        let second = chunk(&three_scene_doc());
        let ids: Vec<_> = first.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, second.iter().map(|c| c.id.clone()).collect::<Vec<_>>());
        assert!(ids[0].starts_with("scene-1-"));

        let unique: BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_wrapped_heading_starts_one_scene() {
        let mut lines = vec![
            ScriptLine::continued(LineType::Heading, "INT. THE OLD OBSERVATORY ON THE HILL ABOVE"),
            ScriptLine::new(LineType::Heading, "THE TOWN - NIGHT"),
        ];
        lines.push(ScriptLine::new(
            LineType::Action,
            "Dust covers the brass telescope. Moonlight cuts across the floor in pale bars.",
        ));
        let doc = DocumentSnapshot::new(lines);

        let chunks = chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.line_range, (0, 2));
        assert_eq!(
            chunks[0].metadata.heading.as_deref(),
            Some("INT. THE OLD OBSERVATORY ON THE HILL ABOVE THE TOWN - NIGHT")
        );
    }

    #[test]
    fn test_lines_before_first_heading_are_skipped() {
        let mut lines = vec![ScriptLine::new(LineType::Other, "DRAFT 3 - DO NOT CIRCULATE")];
        lines.extend(three_scene_doc().lines().iter().cloned());
        let chunks = chunk(&DocumentSnapshot::new(lines));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].metadata.line_range.0, 1);
        assert!(!chunks[0].text.contains("DRAFT"));
    }

    #[test]
    fn test_fallback_for_document_without_headings() {
        let doc = DocumentSnapshot::new(vec![
            ScriptLine::new(
                LineType::Action,
                "A long stretch of action with no scene heading anywhere in the script at all.",
            ),
            ScriptLine::new(LineType::CharacterName, "NOBODY"),
            ScriptLine::new(LineType::Dialogue, "Somebody forgot the sluglines again. Typical."),
        ]);
        assert!(doc.content_chars() >= MIN_CONTENT_CHARS);

        let chunks = chunk(&doc);
        assert_eq!(chunks.len(), 1);
        let meta = &chunks[0].metadata;
        assert_eq!(meta.heading.as_deref(), Some(FALLBACK_HEADING));
        assert_eq!(meta.sequence_number, 1);
        assert_eq!(meta.line_range, (0, 2));
        assert!(meta.has_dialogue_line);
    }

    #[test]
    fn test_placeholder_document_yields_nothing() {
        let doc = DocumentSnapshot::new(vec![
            ScriptLine::new(LineType::Heading, "INT. ROOM - DAY"),
            ScriptLine::new(LineType::Action, "Short."),
        ]);
        assert!(chunk(&doc).is_empty());
        assert!(chunk(&DocumentSnapshot::empty()).is_empty());
    }

    #[test]
    fn test_whitespace_scene_is_dropped() {
        let mut lines = vec![
            ScriptLine::new(LineType::Heading, "   "),
            ScriptLine::new(LineType::Action, "  "),
        ];
        lines.extend(three_scene_doc().lines().iter().cloned());
        let chunks = chunk(&DocumentSnapshot::new(lines));

        assert_eq!(chunks.len(), 3);
        // Scene numbers follow script order, so the dropped scene keeps its slot
        assert_eq!(chunks[0].metadata.sequence_number, 2);
    }

    #[test]
    fn test_chunk_id_uses_bounded_prefix() {
        let base = "x".repeat(ID_DIGEST_CHARS);
        let a = chunk_id(1, &format!("{base}tail one"), ID_DIGEST_CHARS);
        let b = chunk_id(1, &format!("{base}tail two"), ID_DIGEST_CHARS);
        assert_eq!(a, b);
        assert_ne!(a, chunk_id(2, &base, ID_DIGEST_CHARS));
    }
}
