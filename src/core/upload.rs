//! Streaming multipart encoder.
//!
//! Encodes scalar parameters and files into a `multipart/form-data` body
//! produced lazily: file contents are read from disk in fixed-size chunks,
//! never buffered whole. One boundary token is generated per form and used
//! for every part and the terminating marker.

use crate::error::{Error, Result};
use crate::transport::UploadBody;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Fixed read size for file parts.
pub const CHUNK_SIZE: usize = 8192;

/// Progress callback: (file bytes sent so far, total file bytes, current file index).
///
/// The total counts file bytes only, not part headers, so reported
/// percentages are an approximation for human display.
pub type ProgressFn = dyn FnMut(u64, u64, usize) + Send;

pub type ProgressHandle = Arc<Mutex<Box<ProgressFn>>>;

pub fn progress_handle(f: impl FnMut(u64, u64, usize) + Send + 'static) -> ProgressHandle {
    Arc::new(Mutex::new(Box::new(f)))
}

#[derive(Debug)]
struct FilePart {
    path: PathBuf,
    name: String,
    filename: String,
    content_type: String,
    size: u64,
}

#[derive(Debug)]
pub struct MultipartForm {
    boundary: String,
    params: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: format!("----flowctl{}", Uuid::new_v4().simple()),
            params: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Register a file part. The size is stat'ed now so the total transfer
    /// size is known before any byte is sent.
    pub fn file(
        mut self,
        name: impl Into<String>,
        path: &Path,
        filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(path.display().to_string()))
        })?;
        self.files.push(FilePart {
            path: path.to_path_buf(),
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            size: metadata.len(),
        });
        Ok(self)
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Sum of file sizes; the denominator reported to progress callbacks.
    pub fn total_file_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    fn param_header(&self, name: &str, value: &str) -> Vec<u8> {
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
            self.boundary, name, value
        )
        .into_bytes()
    }

    fn file_header(&self, part: &FilePart) -> Vec<u8> {
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            self.boundary, part.name, part.filename, part.content_type
        )
        .into_bytes()
    }

    fn trailer(&self) -> Vec<u8> {
        format!("--{}--\r\n", self.boundary).into_bytes()
    }

    /// Exact byte length of the encoded body.
    pub fn content_length(&self) -> u64 {
        let mut length: u64 = 0;
        for (name, value) in &self.params {
            length += self.param_header(name, value).len() as u64;
        }
        for part in &self.files {
            length += self.file_header(part).len() as u64;
            length += part.size;
            length += 2; // trailing CRLF after file contents
        }
        length + self.trailer().len() as u64
    }

    /// Consume the form into a single-use reader. Files are opened up
    /// front so a missing file fails here rather than mid-transfer.
    pub fn reader(self, progress: Option<ProgressHandle>) -> Result<MultipartReader> {
        let total_file_bytes = self.total_file_bytes();
        let mut segments = VecDeque::new();

        for (name, value) in &self.params {
            segments.push_back(Segment::Bytes(Cursor::new(self.param_header(name, value))));
        }
        for (index, part) in self.files.iter().enumerate() {
            let file = File::open(&part.path).map_err(|e| {
                Error::internal_io(e.to_string(), Some(part.path.display().to_string()))
            })?;
            segments.push_back(Segment::Bytes(Cursor::new(self.file_header(part))));
            segments.push_back(Segment::File { file, index });
            segments.push_back(Segment::Bytes(Cursor::new(b"\r\n".to_vec())));
        }
        segments.push_back(Segment::Bytes(Cursor::new(self.trailer())));

        Ok(MultipartReader {
            segments,
            progress,
            sent_file_bytes: 0,
            total_file_bytes,
        })
    }

    /// Convenience: encode into a transport upload body.
    pub fn into_body(self, progress: Option<ProgressHandle>) -> Result<UploadBody> {
        let content_type = self.content_type();
        let content_length = self.content_length();
        let reader = self.reader(progress)?;
        Ok(UploadBody {
            content_type,
            content_length,
            reader: Box::new(reader),
        })
    }
}

enum Segment {
    Bytes(Cursor<Vec<u8>>),
    File { file: File, index: usize },
}

/// Single-use body reader. Not restartable; a retried upload must rebuild
/// a fresh `MultipartForm`.
pub struct MultipartReader {
    segments: VecDeque<Segment>,
    progress: Option<ProgressHandle>,
    sent_file_bytes: u64,
    total_file_bytes: u64,
}

impl Read for MultipartReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let segment = match self.segments.front_mut() {
                Some(segment) => segment,
                None => return Ok(0),
            };
            let read = match segment {
                Segment::Bytes(cursor) => {
                    let n = cursor.read(buf)?;
                    if n > 0 {
                        return Ok(n);
                    }
                    0
                }
                Segment::File { file, index } => {
                    let cap = buf.len().min(CHUNK_SIZE);
                    let n = file.read(&mut buf[..cap])?;
                    if n > 0 {
                        self.sent_file_bytes += n as u64;
                        if let Some(handle) = &self.progress {
                            if let Ok(mut callback) = handle.lock() {
                                callback(self.sent_file_bytes, self.total_file_bytes, *index);
                            }
                        }
                        return Ok(n);
                    }
                    0
                }
            };
            debug_assert_eq!(read, 0);
            self.segments.pop_front();
        }
    }
}
