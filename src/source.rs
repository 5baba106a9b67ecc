use memmap2::Mmap;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::config::Config;
use crate::error::{PipelineError, Result};

/// Finite, non-restartable stream of integers feeding the producer.
///
/// `None` means the source is exhausted. `Some(Err(_))` reports a bad entry;
/// the producer decides whether to skip it or stop.
pub trait ItemSource: Send {
    fn next_item(&mut self) -> Option<Result<i64>>;
}

impl<S: ItemSource + ?Sized> ItemSource for Box<S> {
    fn next_item(&mut self) -> Option<Result<i64>> {
        (**self).next_item()
    }
}

/// Reads the next whitespace-separated token of `data` starting at `offset`.
/// Returns the parsed value and the offset just past the token.
fn scan_token(data: &[u8], mut offset: usize) -> Option<(Result<i64>, usize)> {
    while offset < data.len() && data[offset].is_ascii_whitespace() {
        offset += 1;
    }
    if offset >= data.len() {
        return None;
    }
    let start = offset;
    while offset < data.len() && !data[offset].is_ascii_whitespace() {
        offset += 1;
    }
    Some((parse_token(&data[start..offset], start), offset))
}

fn parse_token(token: &[u8], offset: usize) -> Result<i64> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| PipelineError::MalformedEntry {
            token: String::from_utf8_lossy(token).into_owned(),
            offset,
        })
}

pub struct TokenScanner<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> TokenScanner<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.offset
    }
}

impl Iterator for TokenScanner<'_> {
    type Item = Result<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        let (item, next) = scan_token(self.data, self.offset)?;
        self.offset = next;
        Some(item)
    }
}

/// File source backed by a read-only memory map.
pub struct MmapSource {
    mmap: Option<Mmap>,
    offset: usize,
}

impl MmapSource {
    pub fn open<P: AsRef<Path>>(path: P, max_size: u64) -> Result<Self> {
        let file = File::open(&path)?;
        let metadata = file.metadata()?;

        if metadata.len() > max_size {
            return Err(PipelineError::SourceTooLarge {
                size: metadata.len(),
                max: max_size,
            });
        }

        // Zero-length files cannot be mapped; they are simply empty sources.
        if metadata.len() == 0 {
            return Ok(Self {
                mmap: None,
                offset: 0,
            });
        }

        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap: Some(mmap),
            offset: 0,
        })
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn tokens(&self) -> TokenScanner<'_> {
        TokenScanner::new(self.data())
    }
}

impl ItemSource for MmapSource {
    fn next_item(&mut self) -> Option<Result<i64>> {
        let (item, next) = scan_token(self.data(), self.offset)?;
        self.offset = next;
        Some(item)
    }
}

/// Line-buffered source for anything readable, e.g. stdin. Lines are read as
/// raw bytes, so invalid UTF-8 surfaces as a malformed token rather than an
/// I/O error.
pub struct ReaderSource<R> {
    reader: R,
    line: Vec<u8>,
    pending: VecDeque<Result<i64>>,
    consumed: usize,
    done: bool,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            pending: VecDeque::new(),
            consumed: 0,
            done: false,
        }
    }
}

impl<R: BufRead + Send> ItemSource for ReaderSource<R> {
    fn next_item(&mut self) -> Option<Result<i64>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.done {
                return None;
            }

            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    self.done = true;
                }
                Ok(n) => {
                    let base = self.consumed;
                    let mut offset = 0;
                    while let Some((item, next)) = scan_token(&self.line, offset) {
                        self.pending.push_back(item.map_err(|e| match e {
                            PipelineError::MalformedEntry { token, offset } => {
                                PipelineError::MalformedEntry {
                                    token,
                                    offset: base + offset,
                                }
                            }
                            other => other,
                        }));
                        offset = next;
                    }
                    self.consumed += n;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// In-memory source, mostly for tests and embedding.
pub struct VecSource {
    items: std::vec::IntoIter<i64>,
}

impl VecSource {
    pub fn new(items: Vec<i64>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl From<Vec<i64>> for VecSource {
    fn from(items: Vec<i64>) -> Self {
        Self::new(items)
    }
}

impl FromIterator<i64> for VecSource {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl ItemSource for VecSource {
    fn next_item(&mut self) -> Option<Result<i64>> {
        self.items.next().map(Ok)
    }
}

/// Opens the source named on the command line; `-` reads stdin.
pub fn open_source(name: &str, config: &Config) -> Result<Box<dyn ItemSource>> {
    if name == "-" {
        return Ok(Box::new(ReaderSource::new(BufReader::new(io::stdin()))));
    }
    Ok(Box::new(MmapSource::open(name, config.max_source_size)?))
}
