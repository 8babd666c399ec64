//! Document discovery and plain-text extraction.
//!
//! Extraction never fails outward: an unreadable or unsupported file is
//! logged and contributes no text, so one bad document cannot abort an ingest.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    /// Classifies by extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "md" | "csv" => Some(DocumentKind::Text),
            "pdf" => Some(DocumentKind::Pdf),
            _ => None,
        }
    }
}

/// Files directly inside `folder` with a supported extension, sorted by path.
///
/// Symlinks are followed. Entries that cannot be read are logged and skipped;
/// only an unreadable `folder` is an error.
pub fn collect_supported_files(folder: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {}: {}", folder.display(), e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        if DocumentKind::from_path(&path).is_some() {
            files.push(path);
        } else {
            tracing::debug!("Skipping unsupported file {}", path.display());
        }
    }
    files.sort();
    Ok(files)
}

/// Returns the normalized text of `path`, or an empty string when it cannot be read.
pub fn extract_text(path: &Path) -> String {
    let Some(kind) = DocumentKind::from_path(path) else {
        tracing::info!("Skipping unsupported file {}", path.display());
        return String::new();
    };

    let result = match kind {
        DocumentKind::Text => {
            fs::read(path).map(|bytes| normalize_lines(&String::from_utf8_lossy(&bytes)))
        }
        DocumentKind::Pdf => extract_pdf(path),
    };
    match result {
        Ok(text) => {
            tracing::debug!("Extracted {} chars from {}", text.chars().count(), path.display());
            text
        }
        Err(e) => {
            tracing::warn!("Failed to extract text from {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// Trims each line and drops blank ones.
fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_pdf(path: &Path) -> io::Result<String> {
    let document = lopdf::Document::load(path).map_err(|e| io::Error::other(e.to_string()))?;
    let mut pages = Vec::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    pages.push(text.to_string());
                }
            }
            Err(e) => tracing::warn!(
                "Skipping page {} of {}: {}",
                page_number,
                path.display(),
                e
            ),
        }
    }
    Ok(pages.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    #[test]
    fn test_text_lines_trimmed_and_blank_lines_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.TXT");
        fs::write(&path, "  Apples are fruit.  \r\n\n\t\nBananas are fruit.\n").unwrap();
        assert_eq!(extract_text(&path), "Apples are fruit.\nBananas are fruit.");
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(&path, b"name,kind\ncarrot,\xFFveg\n").unwrap();
        assert_eq!(extract_text(&path), "name,kind\ncarrot,\u{FFFD}veg");
    }

    #[test]
    #[traced_test]
    fn test_unsupported_and_missing_files_yield_nothing() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("photo.jpg");
        fs::write(&image, [0xFF, 0xD8, 0xFF]).unwrap();
        assert_eq!(extract_text(&image), "");
        assert!(logs_contain("Skipping unsupported file"));

        assert_eq!(extract_text(&dir.path().join("gone.md")), "");
        assert!(logs_contain("Failed to extract text"));
    }

    #[test]
    fn test_broken_pdf_yields_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4 not really").unwrap();
        assert_eq!(extract_text(&path), "");
    }

    #[test]
    fn test_pdf_pages_extracted() {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal("Carrots are vegetables.")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let dir = tempdir().unwrap();
        let path = dir.path().join("veg.pdf");
        doc.save(&path).unwrap();

        assert!(extract_text(&path).contains("Carrots are vegetables."));
    }

    #[test]
    fn test_collect_is_sorted_filtered_and_flat() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("c.PDF"), "c").unwrap();
        fs::write(dir.path().join("d.jpg"), "d").unwrap();
        fs::create_dir(dir.path().join("nested.txt")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("e.txt"), "e").unwrap();

        let names: Vec<_> = collect_supported_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md", "c.PDF"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_follows_symlinks() {
        let docs = tempdir().unwrap();
        let elsewhere = tempdir().unwrap();
        let target = elsewhere.path().join("shared.md");
        fs::write(&target, "Shared notes.").unwrap();
        std::os::unix::fs::symlink(&target, docs.path().join("linked.md")).unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), docs.path().join("dir.txt")).unwrap();
        std::os::unix::fs::symlink(docs.path().join("gone.txt"), docs.path().join("dangling.txt"))
            .unwrap();

        let files = collect_supported_files(docs.path()).unwrap();
        assert_eq!(files, vec![docs.path().join("linked.md")]);
        assert_eq!(extract_text(&files[0]), "Shared notes.");
    }
}
