//! Bounded text rendering of retrieval results for prompt assembly.

use crate::retrieval::retriever::RetrievalResult;
use crate::status::SearchStatus;
use serde::Serialize;

/// Ordered, size-limited block of relevant scenes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextBundle {
    pub text: String,
    /// Number of results rendered into `text`
    pub included: usize,
    pub status: SearchStatus,
}

impl ContextBundle {
    /// A bundle with no content, carrying the reason.
    pub fn empty(status: SearchStatus) -> Self {
        Self {
            text: String::new(),
            included: 0,
            status,
        }
    }

    /// Render results best-first until the next one would exceed `char_budget`.
    ///
    /// The first result is always included, cut down to the budget if needed, so a
    /// successful search never comes back empty-handed because of one long scene.
    pub fn assemble(results: &[RetrievalResult], char_budget: usize) -> Self {
        if results.is_empty() {
            return Self::empty(SearchStatus::NoMatches);
        }

        let mut text = String::new();
        let mut used = 0;
        let mut included = 0;

        for result in results {
            let entry = render_entry(result);
            let entry_chars = entry.chars().count();

            if used + entry_chars > char_budget {
                if included == 0 {
                    text.extend(entry.chars().take(char_budget));
                    included = 1;
                }
                break;
            }

            text.push_str(&entry);
            used += entry_chars;
            included += 1;
        }

        Self {
            text: text.trim_end().to_string(),
            included,
            status: SearchStatus::Matches { count: included },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.included == 0
    }
}

fn render_entry(result: &RetrievalResult) -> String {
    let heading = result.metadata.heading.as_deref().unwrap_or("(untitled scene)");
    format!(
        "Scene {}: {} (similarity {:.2})\n{}\n\n",
        result.metadata.sequence_number, heading, result.similarity, result.chunk_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_ai_context::ChunkMetadata;

    fn result(sequence_number: usize, heading: &str, text: &str, similarity: f32) -> RetrievalResult {
        RetrievalResult {
            id: format!("scene-{sequence_number}"),
            chunk_text: text.to_string(),
            metadata: ChunkMetadata {
                sequence_number,
                heading: Some(heading.to_string()),
                line_range: (0, 1),
                has_character_line: false,
                has_dialogue_line: false,
                has_action_line: true,
                characters: Vec::new(),
                word_count: text.split_whitespace().count(),
            },
            distance: 2.0 * (1.0 - similarity),
            similarity,
        }
    }

    #[test]
    fn test_assemble_renders_in_order() {
        let results = vec![
            result(3, "EXT. PIER - NIGHT", "Rain hammers the boats.", 0.91),
            result(1, "INT. TAVERN - NIGHT", "Fog at the windows.", 0.42),
        ];
        let bundle = ContextBundle::assemble(&results, 10_000);

        assert_eq!(bundle.included, 2);
        assert_eq!(bundle.status, SearchStatus::Matches { count: 2 });
        assert!(bundle.text.starts_with("Scene 3: EXT. PIER - NIGHT (similarity 0.91)\n"));
        let pier = bundle.text.find("Rain hammers").unwrap();
        let tavern = bundle.text.find("Fog at").unwrap();
        assert!(pier < tavern);
    }

    #[test]
    fn test_assemble_respects_budget() {
        let results = vec![
            result(1, "INT. A - DAY", &"a".repeat(50), 0.9),
            result(2, "INT. B - DAY", &"b".repeat(50), 0.8),
        ];
        let first_len = render_entry(&results[0]).chars().count();
        let bundle = ContextBundle::assemble(&results, first_len + 10);

        assert_eq!(bundle.included, 1);
        assert!(!bundle.text.contains('b'.to_string().repeat(50).as_str()));
        assert!(bundle.text.chars().count() <= first_len + 10);
    }

    #[test]
    fn test_oversized_first_result_is_truncated() {
        let results = vec![result(1, "INT. A - DAY", &"x".repeat(500), 0.9)];
        let bundle = ContextBundle::assemble(&results, 100);

        assert_eq!(bundle.included, 1);
        assert!(bundle.text.chars().count() <= 100);
        assert!(bundle.text.starts_with("Scene 1"));
    }

    #[test]
    fn test_no_results_is_no_matches() {
        let bundle = ContextBundle::assemble(&[], 1000);
        assert!(bundle.is_empty());
        assert_eq!(bundle.status, SearchStatus::NoMatches);
        assert_eq!(bundle.status.to_string(), "no relevant matches found");
    }
}
