//! Plain-text screenplay import.
//!
//! Turns a conventionally formatted screenplay (as pasted from a text file) into
//! a [`DocumentSnapshot`]. The classifier is line-oriented and deliberately
//! simple: it recognises scene headings, character cues, parentheticals,
//! dialogue that follows a cue, and transitions. Everything else is action.
//! Blank lines close the current element and are not kept.

use crate::document::{DocumentSnapshot, LineType, ScriptLine};
use regex::Regex;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:INT\./EXT\.|EXT\./INT\.|I/E\.?|INT\.|EXT\.|EST\.)\s").expect("valid regex")
});

static TRANSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z][A-Z .'-]*TO:|FADE OUT\.|FADE IN:|FADE TO BLACK\.)$")
        .expect("valid regex")
});

// Upper-case name, optional extension like (V.O.) or (CONT'D).
static CHARACTER_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9][A-Z0-9 .'\-#]*(?:\s*\([A-Z0-9 .'\-]+\))?$").expect("valid regex")
});

impl DocumentSnapshot {
    /// Classify plain screenplay text into typed lines.
    ///
    /// Every produced line ends its element; wrapped paragraphs in the input are
    /// kept as separate elements of the same type.
    pub fn from_screenplay_text(input: &str) -> Self {
        let mut lines = Vec::new();
        let mut in_dialogue = false;

        for raw in input.lines() {
            let text = raw.trim();
            if text.is_empty() {
                in_dialogue = false;
                continue;
            }

            let line_type = classify(text, in_dialogue);
            in_dialogue = matches!(
                line_type,
                LineType::CharacterName | LineType::Dialogue | LineType::Parenthetical
            );
            lines.push(ScriptLine::new(line_type, text));
        }

        Self::new(lines)
    }
}

fn classify(text: &str, in_dialogue: bool) -> LineType {
    let upper = text.to_uppercase();
    if HEADING.is_match(&upper) && text == upper {
        return LineType::Heading;
    }
    if TRANSITION.is_match(text) {
        return LineType::Transition;
    }
    if in_dialogue {
        if text.starts_with('(') && text.ends_with(')') {
            return LineType::Parenthetical;
        }
        return LineType::Dialogue;
    }
    if text.chars().any(|c| c.is_alphabetic())
        && text.chars().count() <= 40
        && CHARACTER_CUE.is_match(text)
    {
        return LineType::CharacterName;
    }
    LineType::Action
}
