use clap::Parser;
use passage_context::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SNIPPET_CHARS};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// A CLI tool to chunk a text file into JSON passages using passage-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Source name recorded on every passage. Defaults to the input file name.
    #[arg(short, long)]
    source: Option<String>,

    /// Maximum length for each passage, in characters.
    #[arg(short = 'c', long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters carried from the end of one passage into the next.
    #[arg(short = 'o', long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Length of the snippet stored with each passage.
    #[arg(long, default_value_t = DEFAULT_SNIPPET_CHARS)]
    snippet_chars: usize,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let file_content = if let Some(input_path) = &args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let source = args.source.clone().unwrap_or_else(|| {
        args.input
            .as_deref()
            .and_then(|p| Path::new(p).file_name())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "stdin".to_string())
    });

    let chunker = Chunker::new(args.chunk_size, args.chunk_overlap)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let passages = chunker.chunk_document(&source, &file_content, args.snippet_chars);

    let json_output = serde_json::to_string_pretty(&passages)?;
    println!("{json_output}");

    Ok(())
}
