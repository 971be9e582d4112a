//! Split extracted book text into chapter content and solutions.

use super::types::BookSections;
use regex::Regex;
use std::sync::OnceLock;

/// Page separator emitted by text extractors such as `pdftotext`.
pub const PAGE_BREAK: char = '\x0c';

fn solutions_header() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*(solutions|answer key|hints and solutions|answers)[ \t]*$")
            .unwrap_or_else(|error| panic!("solutions header pattern is invalid: {error}"))
    })
}

/// Split `text` at the first solutions header.
///
/// Pages are scanned in order; the first page containing a header line contributes its text
/// before the header to the content section and the header line onward to the solutions
/// section. Every later page is solution text. Pages are rejoined with a newline.
pub fn split_sections(text: &str) -> BookSections {
    let header = solutions_header();
    let mut content = Vec::new();
    let mut solutions = Vec::new();

    for page in text.split(PAGE_BREAK) {
        if !solutions.is_empty() {
            solutions.push(page);
            continue;
        }
        match header.find(page) {
            Some(found) => {
                content.push(&page[..found.start()]);
                solutions.push(&page[found.start()..]);
            }
            None => content.push(page),
        }
    }

    BookSections {
        content: content.join("\n"),
        solutions: solutions.join("\n"),
    }
}

/// Append a companion solutions file after the book's own solutions.
pub fn append_companion_solutions(sections: &mut BookSections, companion: &str) {
    let companion = companion.replace(PAGE_BREAK, "\n");
    if companion.trim().is_empty() {
        return;
    }
    if !sections.solutions.is_empty() {
        sections.solutions.push('\n');
    }
    sections.solutions.push_str(&companion);
}
