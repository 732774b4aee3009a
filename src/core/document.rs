//! Meeting and note documents, the parents of embedding records.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::frontmatter;
use super::paths::PlannerPaths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Meeting,
    Note,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Meeting => "meeting",
            SourceType::Note => "note",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meeting" => Ok(SourceType::Meeting),
            "note" => Ok(SourceType::Note),
            other => Err(format!("unknown source type: {}", other)),
        }
    }
}

/// Reference to the document that owns a set of embedding records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParentRef {
    pub source_type: SourceType,
    pub id: String,
}

impl ParentRef {
    pub fn meeting(id: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Meeting,
            id: id.into(),
        }
    }

    pub fn note(id: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Note,
            id: id.into(),
        }
    }

    /// Stable string key, e.g. `meeting:standup-2024-03-04`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.source_type, self.id)
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_type, self.id)
    }
}

impl FromStr for ParentRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("malformed parent key: {}", s))?;
        Ok(Self {
            source_type: kind.parse()?,
            id: id.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub start: DateTime<Local>,
    pub location: Option<String>,
    pub attendees: Vec<String>,
    pub notes: Option<String>,
    pub purpose: Option<String>,
    pub outcomes: Option<String>,
    pub action_items: Option<String>,
}

impl Meeting {
    pub fn new(id: impl Into<String>, title: impl Into<String>, start: DateTime<Local>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            location: None,
            attendees: Vec::new(),
            notes: None,
            purpose: None,
            outcomes: None,
            action_items: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub body: String,
}

impl Note {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Document {
    Meeting(Meeting),
    Note(Note),
}

impl Document {
    pub fn parent_ref(&self) -> ParentRef {
        match self {
            Document::Meeting(m) => ParentRef::meeting(m.id.clone()),
            Document::Note(n) => ParentRef::note(n.id.clone()),
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Document::Meeting(_) => SourceType::Meeting,
            Document::Note(_) => SourceType::Note,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Document::Meeting(m) => &m.title,
            Document::Note(n) => &n.title,
        }
    }
}

impl From<Meeting> for Document {
    fn from(meeting: Meeting) -> Self {
        Document::Meeting(meeting)
    }
}

impl From<Note> for Document {
    fn from(note: Note) -> Self {
        Document::Note(note)
    }
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid frontmatter in {path}: {source}")]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("meeting {path} has no usable start time")]
    MissingStart { path: PathBuf },

    #[error("{path} reuses id {parent} of {first}")]
    DuplicateId {
        path: PathBuf,
        first: PathBuf,
        parent: ParentRef,
    },
}

/// A document loaded from disk together with its modification time.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Unix milliseconds.
    pub modified: i64,
    pub document: Document,
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn read(path: &Path) -> Result<(String, i64), DocumentError> {
    let io_err = |source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    };
    let content = fs::read_to_string(path).map_err(io_err)?;
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map(|t| DateTime::<Local>::from(t).timestamp_millis())
        .map_err(io_err)?;
    Ok((content, modified))
}

/// Parses a meeting file. The file stem is the id unless frontmatter sets one.
pub fn parse_meeting_file(path: &Path, content: &str) -> Result<Meeting, DocumentError> {
    let (raw, body) = frontmatter::split(content);
    let fm = frontmatter::parse_meeting(raw.unwrap_or("")).map_err(|source| {
        DocumentError::Frontmatter {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let start = fm
        .start
        .as_deref()
        .and_then(frontmatter::parse_start)
        .ok_or_else(|| DocumentError::MissingStart {
            path: path.to_path_buf(),
        })?;

    let stem = file_stem(path);
    Ok(Meeting {
        id: non_empty(fm.id).unwrap_or_else(|| stem.clone()),
        title: non_empty(fm.title).unwrap_or(stem),
        start,
        location: non_empty(fm.location),
        attendees: fm
            .attendees
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect(),
        notes: non_empty(Some(body.to_string())),
        purpose: non_empty(fm.purpose),
        outcomes: non_empty(fm.outcomes),
        action_items: non_empty(fm.action_items),
    })
}

/// Parses a note file. The title falls back to the file stem.
pub fn parse_note_file(path: &Path, content: &str) -> Result<Note, DocumentError> {
    let (raw, body) = frontmatter::split(content);
    let fm = frontmatter::parse_note(raw.unwrap_or("")).map_err(|source| {
        DocumentError::Frontmatter {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let stem = file_stem(path);
    Ok(Note {
        title: non_empty(fm.title).unwrap_or_else(|| stem.clone()),
        id: stem,
        body: body.trim().to_string(),
    })
}

fn markdown_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map(|e| e == "md").unwrap_or(false))
        .collect();
    files.sort();
    files
}

/// Loads every meeting and note under the planner root.
///
/// Files that fail to parse are returned separately so one bad file does not
/// hide the rest of the planner. A file whose id is already taken by an
/// earlier file (in sorted path order) is reported as
/// [`DocumentError::DuplicateId`] and left out.
pub fn collect_documents(paths: &PlannerPaths) -> (Vec<SourceFile>, Vec<DocumentError>) {
    let mut documents: Vec<SourceFile> = Vec::new();
    let mut errors = Vec::new();
    let mut owners: HashMap<ParentRef, PathBuf> = HashMap::new();

    let mut accept = |loaded: Result<SourceFile, DocumentError>| {
        let file = match loaded {
            Ok(file) => file,
            Err(e) => return errors.push(e),
        };
        let parent = file.document.parent_ref();
        match owners.get(&parent) {
            Some(first) => errors.push(DocumentError::DuplicateId {
                path: file.path,
                first: first.clone(),
                parent,
            }),
            None => {
                owners.insert(parent, file.path.clone());
                documents.push(file);
            }
        }
    };

    for path in markdown_files(&paths.meetings) {
        accept(read(&path).and_then(|(content, modified)| {
            let meeting = parse_meeting_file(&path, &content)?;
            Ok(SourceFile {
                path,
                modified,
                document: Document::Meeting(meeting),
            })
        }));
    }

    for path in markdown_files(&paths.notes) {
        accept(read(&path).and_then(|(content, modified)| {
            let note = parse_note_file(&path, &content)?;
            Ok(SourceFile {
                path,
                modified,
                document: Document::Note(note),
            })
        }));
    }

    (documents, errors)
}
