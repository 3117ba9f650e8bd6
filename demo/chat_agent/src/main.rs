use minerva_core::index::DEFAULT_BLOCK_WINDOW;
use minerva_core::tools::WeatherTool;
use minerva_core::{
    Agent, AgentConfig, Dispatcher, DocumentIndex, EmbeddingClient, LlamaClient, SemanticSearch,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

const DEFAULT_DOCUMENT: &str = "demos/solar-system.txt";

/// Split a plain-text document into pages on form feeds and compute the
/// cumulative character boundary of each page in the joined text. Pages
/// are joined with a single space so sentence segmentation can run over
/// the whole document at once.
fn paginate(raw: &str) -> (String, Vec<usize>) {
    let pages: Vec<&str> = raw.split('\u{0c}').collect();
    let mut boundaries = Vec::with_capacity(pages.len());
    let mut acc = 0usize;
    for (i, page) in pages.iter().enumerate() {
        acc += page.chars().count();
        if i + 1 < pages.len() {
            acc += 1; // the joining space
        }
        boundaries.push(acc);
    }
    (pages.join(" "), boundaries)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    minerva_core::telemetry::init_logging("info,minerva_core=info,chat_agent=info")?;

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DOCUMENT.to_string());
    let raw = tokio::fs::read_to_string(&path).await?;
    let (document, boundaries) = paginate(&raw);
    info!(
        target: "chat_agent",
        document = %path,
        pages = boundaries.len(),
        "Loaded document"
    );

    let embedder = Arc::new(EmbeddingClient::from_env()?);
    let llm = Arc::new(LlamaClient::from_env()?);

    let index =
        DocumentIndex::build(&document, &boundaries, &*embedder, DEFAULT_BLOCK_WINDOW).await?;
    info!(target: "chat_agent", sentences = index.len(), "Index ready");

    let search = SemanticSearch::new(embedder);
    let dispatcher = Dispatcher::new(search.clone(), WeatherTool::new());
    let agent = Agent::new(
        llm,
        search,
        dispatcher,
        Arc::new(index),
        AgentConfig::default(),
    );

    println!("Ask me anything about {path}.");
    println!("Commands: !reset  !source  !reference  (Ctrl-D quits)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b">> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "!reset" => {
                agent.reset().await;
                println!("History cleared.");
            }
            "!source" => println!("{}", agent.last_source().await),
            "!reference" => println!("{}", agent.last_reference().await),
            question => {
                let outcome = agent.run_turn(question).await;
                println!("{}", outcome.answer);
            }
        }
    }

    Ok(())
}
