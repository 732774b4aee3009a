//! Chunking of meetings and notes into self-describing text segments.
//!
//! Every chunk repeats the document title so it stays meaningful when it is
//! retrieved on its own. Long text is packed greedily, paragraph by paragraph,
//! into chunks of at most [`MAX_CHUNK_CHARS`] characters. Lengths are counted
//! in Unicode scalar values.

use crate::core::document::{Document, Meeting, Note};

/// Soft upper bound on a chunk's length, prefix included.
pub const MAX_CHUNK_CHARS: usize = 500;

/// A trailing chunk must be longer than this to be kept.
pub const MIN_CHUNK_CHARS: usize = 30;

/// Smallest slice an oversized paragraph is cut into, even when a very long
/// title leaves less room than this.
const MIN_PIECE_CHARS: usize = 100;

const UNTITLED_NOTE: &str = "Untitled Note";

/// Medium date, short time: `Mar 4, 2024 at 9:30 AM`.
const MEETING_DATE_FORMAT: &str = "%b %-d, %Y at %-I:%M %p";

pub fn chunk_document(document: &Document) -> Vec<String> {
    match document {
        Document::Meeting(meeting) => chunk_meeting(meeting),
        Document::Note(note) => chunk_note(note),
    }
}

/// Overview, notes, purpose/outcome and action-item chunks, in that order.
pub fn chunk_meeting(meeting: &Meeting) -> Vec<String> {
    let mut chunks = Vec::new();
    let title = &meeting.title;

    let mut overview = format!(
        "Meeting: {} on {}",
        title,
        meeting.start.format(MEETING_DATE_FORMAT)
    );
    if !meeting.attendees.is_empty() {
        overview.push_str(&format!(" with {}", meeting.attendees.join(", ")));
    }
    if let Some(location) = present(&meeting.location) {
        overview.push_str(&format!(" at {}", location));
    }
    chunks.push(overview);

    if let Some(notes) = present(&meeting.notes) {
        let mut packer = Packer::new(
            format!("Notes from {}: ", title),
            format!("Notes from {} (continued): ", title),
        );
        for paragraph in paragraphs(notes) {
            packer.push(paragraph);
        }
        chunks.extend(packer.finish());
    }

    match (present(&meeting.purpose), present(&meeting.outcomes)) {
        (Some(purpose), Some(outcomes)) => chunks.push(format!(
            "Purpose of {}: {} Outcome: {}",
            title, purpose, outcomes
        )),
        (Some(purpose), None) => chunks.push(format!("Purpose of {}: {}", title, purpose)),
        (None, Some(outcomes)) => chunks.push(format!("Outcome of {}: {}", title, outcomes)),
        (None, None) => {}
    }

    if let Some(action_items) = present(&meeting.action_items) {
        chunks.push(format!("Action items from {}: {}", title, action_items));
    }

    chunks
}

/// A note whose body is empty or only whitespace produces no chunks.
pub fn chunk_note(note: &Note) -> Vec<String> {
    let body = note.body.trim();
    if body.is_empty() {
        return Vec::new();
    }

    let title = if note.title.trim().is_empty() {
        UNTITLED_NOTE
    } else {
        note.title.trim()
    };

    let full_text = format!("Note '{}': {}", title, body);
    if char_len(&full_text) <= MAX_CHUNK_CHARS {
        return vec![full_text];
    }

    let mut packer = Packer::new(
        format!("Note '{}': ", title),
        format!("Note '{}' (continued): ", title),
    );
    for paragraph in paragraphs(body) {
        packer.push(paragraph);
    }
    packer.finish()
}

/// Greedy paragraph packer shared by meeting notes and note bodies.
struct Packer {
    continued_prefix: String,
    current: String,
    current_len: usize,
    has_content: bool,
    chunks: Vec<String>,
}

impl Packer {
    fn new(first_prefix: String, continued_prefix: String) -> Self {
        let current_len = char_len(&first_prefix);
        Self {
            continued_prefix,
            current: first_prefix,
            current_len,
            has_content: false,
            chunks: Vec::new(),
        }
    }

    /// Room for a single piece of text inside a continued chunk.
    fn piece_room(&self) -> usize {
        MAX_CHUNK_CHARS
            .saturating_sub(char_len(&self.continued_prefix))
            .max(MIN_PIECE_CHARS)
    }

    fn push(&mut self, paragraph: &str) {
        for piece in split_to_fit(paragraph, self.piece_room()) {
            self.append(&piece);
        }
    }

    fn append(&mut self, piece: &str) {
        let piece_len = char_len(piece);
        let separator = usize::from(self.has_content);

        if self.has_content && self.current_len + separator + piece_len > MAX_CHUNK_CHARS {
            let closed = std::mem::replace(&mut self.current, self.continued_prefix.clone());
            self.chunks.push(closed.trim().to_string());
            self.current_len = char_len(&self.current);
            self.has_content = false;
        }

        if self.has_content {
            self.current.push(' ');
            self.current_len += 1;
        }
        self.current.push_str(piece);
        self.current_len += piece_len;
        self.has_content = true;
    }

    fn finish(mut self) -> Vec<String> {
        let last = self.current.trim();
        if self.has_content && char_len(last) > MIN_CHUNK_CHARS {
            self.chunks.push(last.to_string());
        }
        self.chunks
    }
}

/// Non-blank lines, trimmed.
fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Splits a paragraph longer than `room` at word boundaries. A single word
/// longer than `room` is cut mid-word.
fn split_to_fit(paragraph: &str, room: usize) -> Vec<String> {
    if char_len(paragraph) <= room {
        return vec![paragraph.to_string()];
    }

    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_len = 0;

    for word in paragraph.split_whitespace() {
        let word_len = char_len(word);
        if piece_len > 0 && piece_len + 1 + word_len > room {
            pieces.push(std::mem::take(&mut piece));
            piece_len = 0;
        }

        if word_len > room {
            let chars: Vec<char> = word.chars().collect();
            for slice in chars.chunks(room) {
                if slice.len() == room {
                    pieces.push(slice.iter().collect());
                } else {
                    piece = slice.iter().collect();
                    piece_len = slice.len();
                }
            }
            continue;
        }

        if piece_len > 0 {
            piece.push(' ');
            piece_len += 1;
        }
        piece.push_str(word);
        piece_len += word_len;
    }

    if piece_len > 0 {
        pieces.push(piece);
    }
    pieces
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
