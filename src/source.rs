//! Document sources.
//!
//! A source can be traversed any number of times; each call to
//! [`DocumentSource::documents`] starts again from the first record. Records that cannot
//! be parsed are skipped rather than reported.

use crate::dto::{CsvRecord, Document};
use crate::error::{DedupError, Result};
use crate::normalize::{clean_title, title_prefix, Normalizer};
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Split};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

pub trait DocumentSource {
    type Docs: Iterator<Item = Document> + Send;

    /// Human readable name used in logs and errors.
    fn name(&self) -> String;

    /// Opens a fresh traversal from the start of the source.
    fn documents(&self) -> Result<Self::Docs>;
}

impl DocumentSource for Vec<Document> {
    type Docs = std::vec::IntoIter<Document>;

    fn name(&self) -> String {
        format!("<memory: {} documents>", self.len())
    }

    fn documents(&self) -> Result<Self::Docs> {
        Ok(self.clone().into_iter())
    }
}

/// Where the text of a JSON record lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextField {
    /// A string at a dotted path.
    Path(String),
    /// The `content` of every `contents` entry whose `mime` is `text/*`, space separated.
    MimeContents,
}

/// Where the title of a JSON record comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TitleField {
    Path(String),
    /// The raw, unnormalized text: whole when shorter than `whole_below` characters,
    /// otherwise its first `max_chars` characters.
    TextPrefix { whole_below: usize, max_chars: usize },
    None,
}

/// Field layout of one JSON-lines corpus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonlSchema {
    pub id: String,
    pub text: TextField,
    pub title: TitleField,
}

impl JsonlSchema {
    /// Washington Post articles.
    pub fn wapo() -> Self {
        JsonlSchema {
            id: "id".into(),
            text: TextField::MimeContents,
            title: TitleField::Path("title".into()),
        }
    }

    /// BETTER dry run collection.
    pub fn better() -> Self {
        JsonlSchema {
            id: "id".into(),
            text: TextField::Path("text".into()),
            title: TitleField::TextPrefix {
                whole_below: 10,
                max_chars: 50,
            },
        }
    }

    /// BETTER evaluation collection.
    pub fn better2() -> Self {
        JsonlSchema {
            id: "derived-metadata.id".into(),
            text: TextField::Path("derived-metadata.text".into()),
            title: TitleField::TextPrefix {
                whole_below: 50,
                max_chars: 50,
            },
        }
    }

    /// MS MARCO v2 passages.
    pub fn marco_passage() -> Self {
        JsonlSchema {
            id: "pid".into(),
            text: TextField::Path("passage".into()),
            title: TitleField::TextPrefix {
                whole_below: 50,
                max_chars: 25,
            },
        }
    }

    pub fn custom(id: &str, text: &str, title: Option<&str>) -> Self {
        JsonlSchema {
            id: id.into(),
            text: TextField::Path(text.into()),
            title: title.map_or(TitleField::None, |path| TitleField::Path(path.into())),
        }
    }

    /// Extracts a document from one parsed record; `None` when the record has no id.
    pub fn extract(&self, record: &Value, normalizer: &Normalizer) -> Option<Document> {
        let id = lookup(record, &self.id).and_then(scalar_string)?;
        let raw_text = match &self.text {
            TextField::Path(path) => lookup(record, path)
                .and_then(scalar_string)
                .unwrap_or_default(),
            TextField::MimeContents => mime_contents(record),
        };
        let title = match &self.title {
            TitleField::Path(path) => lookup(record, path)
                .and_then(scalar_string)
                .map(|title| clean_title(&title))
                .unwrap_or_default(),
            TitleField::TextPrefix {
                whole_below,
                max_chars,
            } => {
                if raw_text.chars().count() < *whole_below {
                    clean_title(&raw_text)
                } else {
                    title_prefix(&raw_text, *max_chars)
                }
            }
            TitleField::None => String::new(),
        };
        Some(Document {
            id,
            title,
            text: normalizer.normalize(&raw_text),
        })
    }
}

/// Walks a dotted path through objects (and arrays, by numeric segment).
fn lookup<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn mime_contents(record: &Value) -> String {
    let mut text = String::new();
    let contents = record.get("contents").and_then(Value::as_array);
    for entry in contents.into_iter().flatten() {
        let is_text = entry
            .get("mime")
            .and_then(Value::as_str)
            .is_some_and(|mime| mime.starts_with("text/"));
        if is_text {
            if let Some(content) = entry.get("content").and_then(scalar_string) {
                text.push_str(&content);
            }
            text.push(' ');
        }
    }
    text
}

/// A JSON-lines file, one record per line.
#[derive(Clone, Debug)]
pub struct JsonlSource {
    path: PathBuf,
    schema: JsonlSchema,
    normalizer: Normalizer,
}

impl JsonlSource {
    pub fn new<P: Into<PathBuf>>(path: P, schema: JsonlSchema, normalizer: Normalizer) -> Self {
        JsonlSource {
            path: path.into(),
            schema,
            normalizer,
        }
    }
}

impl DocumentSource for JsonlSource {
    type Docs = JsonlDocuments;

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn documents(&self) -> Result<Self::Docs> {
        let file =
            File::open(&self.path).map_err(|err| DedupError::source_unavailable(self.name(), err))?;
        Ok(JsonlDocuments {
            lines: BufReader::new(file).split(b'\n'),
            line_number: 0,
            finished: false,
            schema: self.schema.clone(),
            normalizer: self.normalizer.clone(),
        })
    }
}

pub struct JsonlDocuments {
    lines: Split<BufReader<File>>,
    line_number: usize,
    finished: bool,
    schema: JsonlSchema,
    normalizer: Normalizer,
}

impl Iterator for JsonlDocuments {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        if self.finished {
            return None;
        }
        loop {
            // raw bytes, so a line that is not valid UTF-8 is skipped like any other bad record
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    warn!(line = self.line_number + 1, "Stopped reading input: {err}");
                    self.finished = true;
                    return None;
                }
                None => {
                    self.finished = true;
                    return None;
                }
            };
            self.line_number += 1;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let parsed = serde_json::from_slice::<Value>(&line)
                .ok()
                .and_then(|record| self.schema.extract(&record, &self.normalizer));
            match parsed {
                Some(doc) => return Some(doc),
                None => debug!(line = self.line_number, "Skipping malformed record"),
            }
        }
    }
}

#[derive(Clone, Debug)]
enum CsvInput {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// CSV with a header row and columns `id`, `text` and optionally `title`.
#[derive(Clone, Debug)]
pub struct CsvSource {
    input: CsvInput,
    normalizer: Normalizer,
}

impl CsvSource {
    pub fn from_path<P: Into<PathBuf>>(path: P, normalizer: Normalizer) -> Self {
        CsvSource {
            input: CsvInput::Path(path.into()),
            normalizer,
        }
    }

    /// An object already downloaded into memory.
    pub fn from_bytes<B: Into<Arc<[u8]>>>(bytes: B, normalizer: Normalizer) -> Self {
        CsvSource {
            input: CsvInput::Bytes(bytes.into()),
            normalizer,
        }
    }
}

impl DocumentSource for CsvSource {
    type Docs = CsvDocuments;

    fn name(&self) -> String {
        match &self.input {
            CsvInput::Path(path) => path.display().to_string(),
            CsvInput::Bytes(bytes) => format!("<memory: {} bytes>", bytes.len()),
        }
    }

    fn documents(&self) -> Result<Self::Docs> {
        let reader: Box<dyn Read + Send> = match &self.input {
            CsvInput::Path(path) => Box::new(
                File::open(path).map_err(|err| DedupError::source_unavailable(self.name(), err))?,
            ),
            CsvInput::Bytes(bytes) => Box::new(io::Cursor::new(bytes.clone())),
        };
        Ok(CsvDocuments {
            records: csv::Reader::from_reader(reader).into_deserialize(),
            normalizer: self.normalizer.clone(),
        })
    }
}

pub struct CsvDocuments {
    records: csv::DeserializeRecordsIntoIter<Box<dyn Read + Send>, CsvRecord>,
    normalizer: Normalizer,
}

impl Iterator for CsvDocuments {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        loop {
            match self.records.next()? {
                Ok(CsvRecord { id, text, title }) => {
                    return Some(Document {
                        id,
                        title: clean_title(&title),
                        text: self.normalizer.normalize(&text),
                    })
                }
                Err(err) if err.is_io_error() => {
                    warn!("Stopped reading input: {err}");
                    return None;
                }
                Err(err) => debug!("Skipping malformed record: {err}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_dotted_path() {
        let record = json!({"derived-metadata": {"id": 12, "text": "x"}, "list": [{"a": "b"}]});
        assert_eq!(lookup(&record, "derived-metadata.id"), Some(&json!(12)));
        assert_eq!(lookup(&record, "list.0.a"), Some(&json!("b")));
        assert_eq!(lookup(&record, "derived-metadata.missing"), None);
        assert_eq!(lookup(&record, "list.x"), None);
    }

    #[test]
    fn test_extract_wapo() {
        let record = json!({
            "id": "abc",
            "title": "Big\tNews",
            "contents": [
                {"mime": "text/plain", "content": "First <b>part</b>."},
                null,
                {"mime": "image/jpeg", "content": "skip me"},
                {"mime": "text/html", "content": "Second part"}
            ]
        });
        let doc = JsonlSchema::wapo()
            .extract(&record, &Normalizer::new())
            .unwrap();
        assert_eq!(doc.id, "abc");
        assert_eq!(doc.title, "Big News");
        assert_eq!(doc.text, "first part second part");
    }

    #[test]
    fn test_extract_marco_numeric_id_and_prefix_title() {
        let passage = "The passage text is long enough to be cut short for its title.";
        let record = json!({"pid": 42, "passage": passage});
        let doc = JsonlSchema::marco_passage()
            .extract(&record, &Normalizer::new())
            .unwrap();
        assert_eq!(doc.id, "42");
        assert_eq!(doc.title, "The passage text is long ");
        assert_eq!(
            doc.text,
            "the passage text is long enough to be cut short for its title "
        );
    }

    #[test]
    fn test_extract_marco_short_passage_is_whole_title() {
        let record = json!({"pid": 7, "passage": "A short\tpassage of forty-odd characters."});
        let doc = JsonlSchema::marco_passage()
            .extract(&record, &Normalizer::new())
            .unwrap();
        assert_eq!(doc.title, "A short passage of forty-odd characters.");
    }

    #[test]
    fn test_extract_without_id_is_skipped() {
        let record = json!({"text": "orphan"});
        assert!(JsonlSchema::better()
            .extract(&record, &Normalizer::new())
            .is_none());
    }

    #[test]
    fn test_extract_missing_text_is_empty() {
        let record = json!({"id": "a"});
        let doc = JsonlSchema::custom("id", "body", Some("headline"))
            .extract(&record, &Normalizer::new())
            .unwrap();
        assert_eq!(doc.text, "");
        assert_eq!(doc.title, "");
    }

    #[test]
    fn test_memory_source_restarts() {
        let docs = vec![Document::new("1", "", "a"), Document::new("2", "", "b")];
        let first: Vec<Document> = docs.documents().unwrap().collect();
        let second: Vec<Document> = docs.documents().unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_csv_bytes_source() {
        let data = "id,text,title\n1,Hello World,First\n2,\"Other, text\",Second\nbroken\n";
        let source = CsvSource::from_bytes(data.as_bytes(), Normalizer::new());
        for _ in 0..2 {
            let docs: Vec<Document> = source.documents().unwrap().collect();
            assert_eq!(
                docs,
                vec![
                    Document::new("1", "First", "hello world"),
                    Document::new("2", "Second", "other text"),
                ]
            );
        }
    }

    #[test]
    fn test_csv_title_column_is_optional() {
        let data = "id,text\n7,some text\n";
        let docs: Vec<Document> = CsvSource::from_bytes(data.as_bytes(), Normalizer::new())
            .documents()
            .unwrap()
            .collect();
        assert_eq!(docs, vec![Document::new("7", "", "some text")]);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let source = JsonlSource::new(
            "/nonexistent/corpus.jsonl",
            JsonlSchema::better(),
            Normalizer::new(),
        );
        assert!(matches!(
            source.documents(),
            Err(DedupError::SourceUnavailable { .. })
        ));
    }
}
