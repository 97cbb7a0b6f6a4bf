//! Encode command - reports how the cache would judge two prompts

use clap::Args;

use crate::config::AppConfig;
use crate::domain::embedding::cosine_similarity;
use crate::domain::Prompt;
use crate::infrastructure::embedding::EncoderFactory;
use crate::infrastructure::logging::init_logging;

/// Arguments for the encode command
#[derive(Args, Clone)]
pub struct EncodeArgs {
    /// Prompt already in the cache
    pub first: String,

    /// Incoming prompt
    pub second: String,
}

/// Encode both prompts and print their similarity against the configured threshold
pub async fn run(args: EncodeArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging);

    let encoder = EncoderFactory::create(&config.encoder)?;
    let max = config.cache.max_prompt_chars;

    let first = encoder.encode(&Prompt::with_max_chars(&args.first, max)?).await?;
    let second = encoder.encode(&Prompt::with_max_chars(&args.second, max)?).await?;

    let similarity = cosine_similarity(first.vector(), second.vector());
    let threshold = config.cache.similarity_threshold;

    println!("encoder:    {}", encoder.identity());
    println!("similarity: {:.4}", similarity);
    println!("threshold:  {:.4}", threshold);
    println!(
        "decision:   {}",
        if similarity > threshold { "hit" } else { "miss" }
    );

    Ok(())
}
