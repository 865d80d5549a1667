//! Section splitting for the memo and bounded chunking for analyst outputs.
//!
//! Lengths are measured in characters, not bytes.

/// Memo section titles, in the order the synthesis role writes them.
pub const SECTION_HEADERS: [&str; 9] = [
    "Recommendation",
    "Executive Summary",
    "Macro & Sentiment",
    "Quantitative Snapshot",
    "Fundamental Analysis",
    "Technical Analysis",
    "Scenario Analysis",
    "Actionable Takeaways",
    "Data Caveats",
];

/// Label of the section that precedes the first header.
pub const DEFAULT_SECTION: &str = "Introduction";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub label: String,
    pub text: String,
}

fn header_for(line: &str) -> Option<&'static str> {
    // Tolerate markdown heading and bold markers around the title.
    let normalized = line
        .trim()
        .trim_start_matches(['#', '*'])
        .trim_start()
        .to_lowercase();
    SECTION_HEADERS
        .iter()
        .find(|h| normalized.starts_with(&h.to_lowercase()))
        .copied()
}

/// Split `text` into sections at lines that start with a known header.
///
/// The header line belongs to the section it opens. Text before the first
/// header goes into [`DEFAULT_SECTION`]; input without any header comes back
/// as a single `Introduction` section holding the whole text.
pub fn split_into_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut label = DEFAULT_SECTION;
    let mut buffer: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if let Some(header) = header_for(line) {
            if !buffer.is_empty() {
                sections.push(Section {
                    label: label.to_string(),
                    text: buffer.join("\n"),
                });
            }
            label = header;
            buffer = vec![line];
        } else {
            buffer.push(line);
        }
    }

    if !buffer.is_empty() {
        sections.push(Section {
            label: label.to_string(),
            text: buffer.join("\n"),
        });
    }

    sections
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn flush(chunks: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split `text` into chunks of at most `bound` characters.
///
/// Paragraphs are packed greedily; a paragraph longer than `bound` is broken
/// at line and sentence ends and the pieces packed the same way, keeping
/// their line breaks. A single sentence longer than `bound` is kept whole. Text within `bound` is returned as one
/// chunk unchanged; blank text yields no chunks.
pub fn chunk_text(text: &str, bound: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if char_len(text) <= bound {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let para_len = char_len(para);

        if char_len(&current) + para_len + 2 <= bound {
            current.push_str(para);
            current.push_str("\n\n");
            continue;
        }

        flush(&mut chunks, &current);
        current.clear();

        if para_len > bound {
            // Pieces keep their trailing separators.
            let pieces = para
                .split_inclusive('\n')
                .flat_map(|line| line.split_inclusive(". "));
            for piece in pieces {
                if char_len(&current) + char_len(piece) <= bound {
                    current.push_str(piece);
                } else {
                    flush(&mut chunks, &current);
                    current = piece.to_string();
                }
            }
        } else {
            current = format!("{para}\n\n");
        }
    }

    flush(&mut chunks, &current);
    chunks
}
