//! Read-only screenplay document model.
//!
//! A [`DocumentSnapshot`] is an ordered sequence of [`ScriptLine`]s captured from
//! the editor at a point in time. Nothing in this workspace mutates a snapshot;
//! the editor hands out a fresh one whenever freshness matters.
//!
//! Long elements wrap onto several lines. Every line carries an
//! `ends_element` marker that is `true` only on the last line of its element,
//! which is how the chunker tells a two-line scene heading from two headings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element type of a single screenplay line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineType {
    /// Scene heading ("INT. KITCHEN - NIGHT")
    Heading,
    /// Character cue above a dialogue block
    CharacterName,
    Dialogue,
    Parenthetical,
    Action,
    Transition,
    /// Anything else (notes, shots, act breaks...)
    Other,
}

impl LineType {
    /// Short tag used by the tagged line format (`heading|INT. HOUSE - DAY`).
    pub fn tag(&self) -> &'static str {
        match self {
            LineType::Heading => "heading",
            LineType::CharacterName => "character",
            LineType::Dialogue => "dialogue",
            LineType::Parenthetical => "paren",
            LineType::Action => "action",
            LineType::Transition => "transition",
            LineType::Other => "other",
        }
    }
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for LineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "heading" | "scene" | "scene-heading" => Ok(LineType::Heading),
            "character" | "character-name" | "char" => Ok(LineType::CharacterName),
            "dialogue" | "dial" => Ok(LineType::Dialogue),
            "paren" | "parenthetical" => Ok(LineType::Parenthetical),
            "action" => Ok(LineType::Action),
            "transition" | "trans" => Ok(LineType::Transition),
            "other" | "note" | "shot" => Ok(LineType::Other),
            _ => Err(format!(
                "Invalid line type: '{s}'. Valid values are: heading, character, dialogue, paren, action, transition, other"
            )),
        }
    }
}

/// One physical line of the screenplay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    pub line_type: LineType,
    pub text: String,
    /// True on the last line of a (possibly wrapped) element
    pub ends_element: bool,
}

impl ScriptLine {
    /// A single-line element.
    pub fn new(line_type: LineType, text: impl Into<String>) -> Self {
        Self {
            line_type,
            text: text.into(),
            ends_element: true,
        }
    }

    /// A line that wraps onto the next one (not the last line of its element).
    pub fn continued(line_type: LineType, text: impl Into<String>) -> Self {
        Self {
            line_type,
            text: text.into(),
            ends_element: false,
        }
    }

    pub fn is_scene_boundary(&self) -> bool {
        self.line_type == LineType::Heading && self.ends_element
    }
}

/// Immutable point-in-time copy of the document's lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    lines: Vec<ScriptLine>,
}

impl DocumentSnapshot {
    pub fn new(lines: Vec<ScriptLine>) -> Self {
        Self { lines }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Count of non-whitespace characters across every line.
    pub fn content_chars(&self) -> usize {
        self.lines
            .iter()
            .map(|line| line.text.chars().filter(|c| !c.is_whitespace()).count())
            .sum()
    }

    /// Parse the tagged line format: one line per row, `<tag>|<text>`.
    ///
    /// A trailing `+` on the tag (`action+|...`) marks a line that continues
    /// onto the next row. Blank rows are skipped.
    pub fn from_tagged_lines(input: &str) -> Result<Self, String> {
        let mut lines = Vec::new();
        for (row, raw) in input.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            let (tag, text) = raw
                .split_once('|')
                .ok_or_else(|| format!("Row {}: expected '<tag>|<text>'", row + 1))?;
            let (tag, continued) = match tag.strip_suffix('+') {
                Some(stripped) => (stripped, true),
                None => (tag, false),
            };
            let line_type = tag
                .parse::<LineType>()
                .map_err(|e| format!("Row {}: {e}", row + 1))?;
            lines.push(ScriptLine {
                line_type,
                text: text.to_string(),
                ends_element: !continued,
            });
        }
        Ok(Self { lines })
    }

    /// Render back to the tagged line format.
    pub fn to_tagged_lines(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line.line_type.tag());
            if !line.ends_element {
                out.push('+');
            }
            out.push('|');
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }
}

impl FromIterator<ScriptLine> for DocumentSnapshot {
    fn from_iter<T: IntoIterator<Item = ScriptLine>>(iter: T) -> Self {
        Self {
            lines: iter.into_iter().collect(),
        }
    }
}

/// Read-only accessor for the live document.
///
/// Returns `None` when no document is open or it cannot be read.
pub trait DocumentSource: Send + Sync {
    fn snapshot(&self) -> Option<DocumentSnapshot>;
}

impl DocumentSource for DocumentSnapshot {
    fn snapshot(&self) -> Option<DocumentSnapshot> {
        Some(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_lines_parse() {
        let input = "heading|INT. KITCHEN - NIGHT\n\
                     action+|Rain hammers the window while\n\
                     action|MARA waits.\n\
                     \n\
                     character|MARA\n\
                     dialogue|Where were you?\n";
        let doc = DocumentSnapshot::from_tagged_lines(input).unwrap();

        assert_eq!(doc.len(), 5);
        assert_eq!(doc.lines()[0].line_type, LineType::Heading);
        assert!(doc.lines()[0].is_scene_boundary());
        assert!(!doc.lines()[1].ends_element);
        assert!(doc.lines()[2].ends_element);
        assert_eq!(doc.lines()[3].line_type, LineType::CharacterName);
    }

    #[test]
    fn test_tagged_lines_roundtrip_preserves_markers() {
        let doc = DocumentSnapshot::new(vec![
            ScriptLine::continued(LineType::Heading, "INT. A VERY LONG"),
            ScriptLine::new(LineType::Heading, "HALLWAY - DAY"),
            ScriptLine::new(LineType::Action, "Nothing moves."),
        ]);
        let parsed = DocumentSnapshot::from_tagged_lines(&doc.to_tagged_lines()).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_tagged_lines_rejects_bad_rows() {
        assert!(DocumentSnapshot::from_tagged_lines("no separator here").is_err());
        assert!(DocumentSnapshot::from_tagged_lines("bogus|text").is_err());
    }

    #[test]
    fn test_content_chars_ignores_whitespace() {
        let doc = DocumentSnapshot::new(vec![
            ScriptLine::new(LineType::Action, "  a b  "),
            ScriptLine::new(LineType::Action, "\t\n"),
        ]);
        assert_eq!(doc.content_chars(), 2);
    }

    #[test]
    fn test_line_type_from_str() {
        assert_eq!("Scene".parse::<LineType>().unwrap(), LineType::Heading);
        assert_eq!(
            "character-name".parse::<LineType>().unwrap(),
            LineType::CharacterName
        );
        assert!("invalid".parse::<LineType>().is_err());
    }
}
