use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use delve_contracts::report::render_research_report;
use delve_contracts::research::write_results;
use delve_engine::{
    DuckDuckGo, OllamaClient, ResearchOptions, Researcher, WebExtractor, DEFAULT_API_BASE,
    DEFAULT_RESEARCH_MODEL,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "delve",
    version,
    about = "Deep research assistant backed by a local Ollama model and web search"
)]
struct Cli {
    /// The research question to investigate
    question: String,
    /// Number of analysis iterations
    #[arg(long, default_value_t = 2)]
    depth: usize,
    /// Maximum number of web results to include
    #[arg(long = "web-results", default_value_t = 5)]
    web_results: usize,
    /// Optional file path for saving the full result as JSON
    #[arg(long)]
    output: Option<PathBuf>,
    /// Model submitted with every generation request
    #[arg(long, default_value = DEFAULT_RESEARCH_MODEL)]
    model: String,
    /// Base URL of the local generation endpoint
    #[arg(long = "api-base", default_value = DEFAULT_API_BASE)]
    api_base: String,
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(err) => {
            eprintln!("delve error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("delve_engine=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let generator = OllamaClient::new(&cli.api_base, &cli.model)?;
    let search = DuckDuckGo::new()?;
    let extractor = WebExtractor::new()?;
    let options = ResearchOptions {
        depth: cli.depth,
        max_web_results: cli.web_results,
        ..ResearchOptions::default()
    };
    let researcher = Researcher::new(&generator, &search, &extractor, options);

    let results = researcher.research(&cli.question)?;
    print!("{}", render_research_report(&results));

    if let Some(path) = cli.output.as_deref() {
        write_results(path, &results)?;
        println!("\nResults saved to: {}", path.display());
    }
    Ok(())
}
