use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use super::{Document, DocumentStream, DocumentStore, Filter};
use crate::error::{Result, StabilityError};

/// A document store backed by a directory tree.
///
/// A collection path maps to a directory under `root`. Inside it, each
/// `*.json` file is one document (id = file stem) and each `*.ndjson` file
/// holds one document per line (id = the `id` field, else `stem:line`).
/// Files are visited in name order so reads are deterministic.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Runs filesystem work off the async runtime threads.
async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StabilityError::store(format!("filesystem task failed: {e}")))?
}

fn collection_files(root: &Path, path: &str) -> Result<VecDeque<PathBuf>> {
    let dir = root.join(path);
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Collection directory missing, treating as empty");
        return Ok(VecDeque::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && file_kind(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();

    Ok(files.into())
}

/// Listing reads every file here. A query only lists the directory; the
/// returned stream reads lazily and is meant to be drained on a blocking
/// thread.
#[async_trait::async_trait]
impl DocumentStore for LocalStore {
    async fn list_documents(&self, path: &str) -> Result<Vec<Document>> {
        let root = self.root.clone();
        let path = path.to_string();
        blocking(move || {
            let files = collection_files(&root, &path)?;
            LocalDocuments::new(files, Vec::new()).collect()
        })
        .await
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> Result<DocumentStream> {
        let root = self.root.clone();
        let collection = collection.to_string();
        let files = blocking(move || collection_files(&root, &collection)).await?;
        Ok(Box::new(LocalDocuments::new(files, filters.to_vec())))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Single,
    Lines,
}

fn file_kind(path: &Path) -> Option<FileKind> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Some(FileKind::Single),
        Some("ndjson") | Some("jsonl") => Some(FileKind::Lines),
        _ => None,
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

struct OpenLines {
    stem: String,
    line_no: usize,
    lines: Lines<BufReader<File>>,
}

/// Walks files one at a time, reading line files incrementally.
struct LocalDocuments {
    files: VecDeque<PathBuf>,
    current: Option<OpenLines>,
    filters: Vec<Filter>,
}

impl LocalDocuments {
    fn new(files: VecDeque<PathBuf>, filters: Vec<Filter>) -> Self {
        Self {
            files,
            current: None,
            filters,
        }
    }

    fn accept(&self, doc: Document) -> Option<Document> {
        self.filters.iter().all(|f| f.matches(&doc)).then_some(doc)
    }

    fn next_from_lines(&mut self) -> Option<Result<Document>> {
        let open = self.current.as_mut()?;
        loop {
            let line = match open.lines.next() {
                None => {
                    self.current = None;
                    return None;
                }
                Some(Err(e)) => return Some(Err(e.into())),
                Some(Ok(line)) => line,
            };
            open.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(&line) {
                Ok(data) => {
                    let id = data
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{}:{}", open.stem, open.line_no));
                    return Some(Ok(Document { id, data }));
                }
                Err(e) => {
                    warn!(file = %open.stem, line = open.line_no, error = %e, "Skipping undecodable record");
                }
            }
        }
    }
}

impl Iterator for LocalDocuments {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_some() {
                match self.next_from_lines() {
                    Some(Ok(doc)) => match self.accept(doc) {
                        Some(doc) => return Some(Ok(doc)),
                        None => continue,
                    },
                    Some(Err(e)) => return Some(Err(e)),
                    None => continue,
                }
            }

            let path = self.files.pop_front()?;
            match file_kind(&path) {
                Some(FileKind::Single) => {
                    let content = match std::fs::read_to_string(&path) {
                        Ok(c) => c,
                        Err(e) => return Some(Err(e.into())),
                    };
                    match serde_json::from_str::<Value>(&content) {
                        Ok(data) => {
                            if let Some(doc) = self.accept(Document {
                                id: stem(&path),
                                data,
                            }) {
                                return Some(Ok(doc));
                            }
                        }
                        Err(e) => {
                            warn!(file = %path.display(), error = %e, "Skipping undecodable document");
                        }
                    }
                }
                Some(FileKind::Lines) => match File::open(&path) {
                    Ok(file) => {
                        self.current = Some(OpenLines {
                            stem: stem(&path),
                            line_no: 0,
                            lines: BufReader::new(file).lines(),
                        });
                    }
                    Err(e) => return Some(Err(e.into())),
                },
                None => {}
            }
        }
    }
}
