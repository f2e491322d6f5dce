use office_text_extract::{LogConfig, MemoryTokenCache, OcrClient, OcrConfig, init_logging};
use std::env;
use std::sync::Arc;

/// Needs OCR_API_KEY and OCR_API_SECRET in the environment
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LogConfig::from_env())?;

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: {} <image_path | image_url | file.pdf>", args[0]);
        std::process::exit(1);
    }

    let source = &args[1];
    let client = OcrClient::connect(OcrConfig::from_env()?, Arc::new(MemoryTokenCache::new())).await?;

    let words = if source.starts_with("http://") || source.starts_with("https://") {
        client.image_url_to_word(source).await?
    } else if source.to_lowercase().ends_with(".pdf") {
        client.pdf_to_word(source).await?
    } else {
        client.image_to_word(source).await?
    };

    if words.is_empty() {
        println!("No text recognized (the request may have been rejected; see the log)");
    } else {
        println!("{}", words);
    }

    Ok(())
}
