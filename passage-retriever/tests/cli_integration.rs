use anyhow::Result;
use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Runs the CLI binary against the index in `index_dir` with the hashing embedder.
fn run_cli(index_dir: &TempDir, args: &[&str]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_passage-retriever"))
        .arg("--index-dir")
        .arg(index_dir.path())
        .arg("--hash-embeddings")
        .args(args)
        .env("RUST_LOG", "error")
        .output()?;
    Ok(output)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn populate_docs() -> Result<TempDir> {
    let docs = TempDir::new()?;
    fs::write(
        docs.path().join("produce.txt"),
        "Apples are fruit. Bananas are fruit. Carrots are vegetables.",
    )?;
    fs::write(docs.path().join("notes.md"), "# Notes\nStore fruit somewhere cool.")?;
    Ok(docs)
}

#[test]
fn test_ingest_then_search_json() -> Result<()> {
    let index_dir = TempDir::new()?;
    let docs = populate_docs()?;

    let output = run_cli(&index_dir, &["ingest", docs.path().to_str().unwrap()])?;
    assert!(output.status.success(), "ingest failed: {output:?}");
    assert!(stdout(&output).contains("Indexed"));
    assert!(index_dir.path().join("vector_index.bin").is_file());
    assert!(index_dir.path().join("vector_meta.json").is_file());
    assert!(index_dir.path().join("embeddings.bin").is_file());
    assert!(index_dir.path().join("chunk_info.json").is_file());

    let output = run_cli(&index_dir, &["search", "fruit", "-k", "2", "--format", "json"])?;
    assert!(output.status.success());
    let items: serde_json::Value = serde_json::from_str(&stdout(&output))?;
    let items = items.as_array().expect("array of results");
    assert_eq!(items.len(), 2);
    assert!(items[0]["source"].is_string());
    assert!(items[0]["score"].is_number());
    Ok(())
}

#[test]
fn test_context_and_status() -> Result<()> {
    let index_dir = TempDir::new()?;
    let docs = populate_docs()?;
    assert!(run_cli(&index_dir, &["ingest", docs.path().to_str().unwrap()])?
        .status
        .success());

    let output = run_cli(&index_dir, &["context", "fruit", "--prompt"])?;
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Context:"));
    assert!(text.contains("Question: fruit"));

    let output = run_cli(&index_dir, &["status", "--format", "json"])?;
    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_str(&stdout(&output))?;
    assert_eq!(status["phase"], "ready");
    assert_eq!(status["index_on_disk"], true);
    assert_eq!(status["embedding"]["provider"], "hash");
    Ok(())
}

#[test]
fn test_errors_exit_nonzero() -> Result<()> {
    let index_dir = TempDir::new()?;

    let output = run_cli(&index_dir, &["load"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not found"));

    let images = TempDir::new()?;
    fs::write(images.path().join("photo.jpg"), [0xFF, 0xD8])?;
    let output = run_cli(&index_dir, &["ingest", images.path().to_str().unwrap()])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No supported documents"));
    Ok(())
}
