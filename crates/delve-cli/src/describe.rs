use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use delve_contracts::report::render_description;
use delve_engine::{
    describe_image, OllamaClient, DEFAULT_API_BASE, DEFAULT_VISION_MODEL, DESCRIBE_PROMPT,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "delve-describe",
    version,
    about = "Describe an image using a local vision-language model"
)]
struct Cli {
    /// Path to the image file
    image_path: PathBuf,
    /// Model submitted with the generation request
    #[arg(long, default_value = DEFAULT_VISION_MODEL)]
    model: String,
    /// Base URL of the local generation endpoint
    #[arg(long = "api-base", default_value = DEFAULT_API_BASE)]
    api_base: String,
    /// Prompt submitted alongside the encoded image
    #[arg(long, default_value = DESCRIBE_PROMPT)]
    prompt: String,
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(err) => {
            eprintln!("delve-describe error: {err:#}");
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
    // Image read/decode failures abort; generation failures degrade to an
    // error string printed in the description slot.
    let description = describe_image(&generator, &cli.image_path, &cli.prompt)?;
    print!("{}", render_description(&description));
    Ok(())
}
