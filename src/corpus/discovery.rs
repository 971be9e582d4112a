//! Locate textbook files and their companion solution files on disk.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Marker in a file stem identifying a companion solutions file.
pub const SOLUTIONS_SUFFIX: &str = "_Solutions";

const BOOK_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// A book found on disk, optionally paired with a companion solutions file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFile {
    /// File stem used as the book title and `source_book` value.
    pub title: String,
    /// Path to the book text.
    pub path: PathBuf,
    /// `<stem>_Solutions.<ext>` next to the book, when present.
    pub solutions: Option<PathBuf>,
}

/// Walk `root` and return every book file, sorted by title.
///
/// Files whose stem contains `_Solutions` are only ever used as companions. When two files share
/// a stem (for example `notes.txt` and `notes.md`), the first one in walk order wins.
pub fn discover_books(root: &Path) -> io::Result<Vec<BookFile>> {
    let mut books: BTreeMap<String, BookFile> = BTreeMap::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(extension) = book_extension(path) else {
            continue;
        };
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            tracing::warn!(path = %path.display(), "Skipping file with non UTF-8 name");
            continue;
        };
        if stem.contains(SOLUTIONS_SUFFIX) {
            continue;
        }
        if books.contains_key(stem) {
            tracing::debug!(book = stem, path = %path.display(), "Book already discovered; skipping");
            continue;
        }

        let companion = path.with_file_name(format!("{stem}{SOLUTIONS_SUFFIX}.{extension}"));
        let solutions = companion.is_file().then_some(companion);
        books.insert(
            stem.to_string(),
            BookFile {
                title: stem.to_string(),
                path: path.to_path_buf(),
                solutions,
            },
        );
    }

    Ok(books.into_values().collect())
}

fn book_extension(path: &Path) -> Option<&str> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| BOOK_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn pairs_books_with_companion_solutions() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("HC_Verma.txt"), "content").expect("write");
        fs::write(dir.path().join("HC_Verma_Solutions.txt"), "solutions").expect("write");
        fs::write(dir.path().join("Irodov.md"), "content").expect("write");
        fs::write(dir.path().join("cover.pdf"), "binary").expect("write");

        let books = discover_books(dir.path()).expect("discover");
        assert_eq!(books.len(), 2);

        assert_eq!(books[0].title, "HC_Verma");
        assert_eq!(
            books[0].solutions.as_deref(),
            Some(dir.path().join("HC_Verma_Solutions.txt").as_path())
        );
        assert_eq!(books[1].title, "Irodov");
        assert!(books[1].solutions.is_none());
    }

    #[test]
    fn orphan_solution_files_are_not_books() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("Pandey_Solutions.txt"), "solutions").expect("write");

        assert!(discover_books(dir.path()).expect("discover").is_empty());
    }

    #[test]
    fn each_title_is_processed_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("vol2");
        fs::create_dir(&nested).expect("mkdir");
        fs::write(dir.path().join("Physics.txt"), "one").expect("write");
        fs::write(nested.join("Physics.txt"), "two").expect("write");

        let books = discover_books(dir.path()).expect("discover");
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].path, dir.path().join("Physics.txt"));
    }
}
