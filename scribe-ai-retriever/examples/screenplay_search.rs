//! Demonstration of semantic scene search over a small screenplay
//!
//! Indexes the script once, asks a few questions, then shows that an unchanged
//! script is not re-indexed and a repeated question is answered from the cache.

use anyhow::Result;
use scribe_ai_context::DocumentSnapshot;
use scribe_ai_retriever::RetrieverConfig;

const SCRIPT: &str = "\
EXT. HARBOUR - NIGHT

Rain lashes the pier. The weather turns the sea black and the boats strain at their ropes.

MARA
This weather will sink us all.

INT. TAVERN - NIGHT

Candles gutter. Fishermen hunch over tankards of ale.

ODA
Nobody sails tonight. Another round.

EXT. MARKET SQUARE - DAY

Stalls of bread, cheese and copper pots. Children chase a loose goat between the carts.
";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let snapshot = DocumentSnapshot::from_screenplay_text(SCRIPT);
    let registry = RetrieverConfig::default().build_registry().await?;
    let context = registry.context("harbour")?;

    let status = context.ensure_up_to_date(&snapshot).await?;
    println!("Indexed {} scenes ({:?})\n", status.chunk_count, status.outcome);

    for query in ["bad weather at sea", "drinking in the tavern", "a goat"] {
        println!("Query: {query}");
        for result in context.retrieve(query, 2).await? {
            println!(
                "  {:.3}  Scene {}: {}",
                result.similarity,
                result.metadata.sequence_number,
                result.metadata.heading.as_deref().unwrap_or("(untitled)")
            );
        }
        println!();
    }

    let again = context.ensure_up_to_date(&snapshot).await?;
    println!("Second refresh: {:?}", again.outcome);

    let bundle = context
        .retrieve_context(&snapshot, "bad weather at sea", 2, 400)
        .await;
    println!("\n[{}]\n{}", bundle.status, bundle.text);

    println!("\n{}", context.report().await);
    Ok(())
}
