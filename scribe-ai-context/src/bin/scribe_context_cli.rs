use clap::{Parser, ValueEnum};
use scribe_ai_context::{Chunker, ChunkerConfig, DocumentSnapshot, FingerprintMode};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};

/// Chunk a screenplay into scene chunks and print them as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input screenplay. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// How to read the input.
    #[arg(short, long, value_enum, default_value_t = InputFormat::Plain)]
    format: InputFormat,

    /// Minimum non-whitespace characters before a document is chunked at all.
    #[arg(long, default_value_t = scribe_ai_context::MIN_CONTENT_CHARS)]
    min_content_chars: usize,

    /// Also print the document fingerprint using this mode (prefix or full).
    #[arg(long)]
    fingerprint: Option<FingerprintMode>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InputFormat {
    /// Conventionally formatted screenplay text
    Plain,
    /// One `<tag>|<text>` row per line
    Tagged,
}

#[derive(Serialize)]
struct Output<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
    line_count: usize,
    chunks: &'a [scribe_ai_context::Chunk],
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let content = if let Some(input_path) = &args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let snapshot = match args.format {
        InputFormat::Plain => DocumentSnapshot::from_screenplay_text(&content),
        InputFormat::Tagged => DocumentSnapshot::from_tagged_lines(&content)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
    };

    let chunker = Chunker::new(ChunkerConfig {
        min_content_chars: args.min_content_chars,
        ..ChunkerConfig::default()
    });
    let chunks = chunker.chunk(&snapshot);

    let output = Output {
        fingerprint: args
            .fingerprint
            .and_then(|mode| scribe_ai_context::fingerprint_with_mode(&snapshot, mode).to_hex()),
        line_count: snapshot.len(),
        chunks: &chunks,
    };

    let json = serde_json::to_string_pretty(&output).map_err(io::Error::other)?;
    println!("{json}");

    Ok(())
}
