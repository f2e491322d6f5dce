use office_text_extract::{ConverterConfig, DocumentConverter, LogConfig, init_logging};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&LogConfig::from_env())?;

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: {} <file_path_or_url>", args[0]);
        println!("\nExamples:");
        println!("  {} report.docx", args[0]);
        println!("  {} https://example.com/files/budget.xlsx", args[0]);
        println!("\nSupported formats: .xlsx, .xls, .ods, .docx, .pptx, .txt");
        std::process::exit(1);
    }

    let source = &args[1];
    let converter = DocumentConverter::new(ConverterConfig::from_env())?;

    let result = if source.starts_with("http://") || source.starts_with("https://") {
        converter.convert_url(source).await?
    } else {
        converter.convert_file(source)?
    };

    println!("Source: {}", source);
    println!("Type:   .{}", result.suffix);
    println!("Size:   {} bytes", result.size);
    println!("Text:   {} characters\n", result.text.chars().count());
    println!("{}", result.text);

    Ok(())
}
