//! Where messages come from.
//!
//! A source hands out deliveries and is told when each one may be
//! forgotten. Acknowledging a tag acknowledges everything delivered before
//! it, so a source only needs to remember one position.

use std::{
  collections::VecDeque,
  ffi::OsString,
  future::Future,
  io,
  path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::{
  fs::File,
  io::{AsyncBufReadExt as _, BufReader, Lines},
};

/// One raw message handed out by a source and not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
  /// Source-assigned position, passed back to [`MessageSource::ack`].
  pub tag:  u64,
  pub body: String,
}

/// A queue of inbound messages with at-least-once delivery.
pub trait MessageSource: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The next delivery, or `None` once the source is exhausted.
  fn next(&mut self) -> impl Future<Output = Result<Option<Delivery>, Self::Error>> + Send + '_;

  /// Acknowledge `tag` and every delivery before it.
  fn ack(&mut self, tag: u64) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── JSON lines ──────────────────────────────────────────────────────────────

/// A file of one JSON message per line.
///
/// The last acknowledged line is kept in a sidecar `<file>.offset`, so a
/// restarted consumer resumes after it. Lines delivered but not acknowledged
/// before a crash are delivered again.
pub struct JsonLinesSource {
  lines:       Lines<BufReader<File>>,
  line:        u64,
  offset_path: PathBuf,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
  let mut s = OsString::from(path.as_os_str());
  s.push(suffix);
  PathBuf::from(s)
}

impl JsonLinesSource {
  /// Open `path`, skipping lines acknowledged by an earlier run.
  pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
    let path = path.as_ref();
    let offset_path = with_suffix(path, ".offset");
    let resume_after: u64 = match tokio::fs::read_to_string(&offset_path).await {
      Ok(s) => s
        .trim()
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
      Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
      Err(e) => return Err(e),
    };

    let mut source = Self {
      lines: BufReader::new(File::open(path).await?).lines(),
      line: 0,
      offset_path,
    };
    while source.line < resume_after && source.lines.next_line().await?.is_some() {
      source.line += 1;
    }
    if resume_after > 0 {
      tracing::info!(path = %path.display(), line = source.line, "resuming message file");
    }
    Ok(source)
  }
}

impl MessageSource for JsonLinesSource {
  type Error = io::Error;

  async fn next(&mut self) -> io::Result<Option<Delivery>> {
    while let Some(body) = self.lines.next_line().await? {
      self.line += 1;
      if body.trim().is_empty() {
        continue;
      }
      return Ok(Some(Delivery { tag: self.line, body }));
    }
    Ok(None)
  }

  async fn ack(&mut self, tag: u64) -> io::Result<()> {
    let tmp = with_suffix(&self.offset_path, ".tmp");
    tokio::fs::write(&tmp, tag.to_string()).await?;
    tokio::fs::rename(&tmp, &self.offset_path).await
  }
}

// ─── In memory ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("message source unavailable")]
pub struct Unavailable;

/// A source over a fixed list of bodies, able to simulate outages.
#[derive(Debug, Default)]
pub struct MemorySource {
  pending:  VecDeque<Delivery>,
  failures: u32,
  acked:    Vec<u64>,
}

impl MemorySource {
  pub fn new(bodies: impl IntoIterator<Item = String>) -> Self {
    let pending = bodies
      .into_iter()
      .zip(1..)
      .map(|(body, tag)| Delivery { tag, body })
      .collect();
    Self { pending, ..Self::default() }
  }

  /// Make the next `n` reads fail.
  pub fn fail_next(&mut self, n: u32) { self.failures = n; }

  /// Tags acknowledged so far, in order.
  pub fn acked(&self) -> &[u64] { &self.acked }
}

impl MessageSource for MemorySource {
  type Error = Unavailable;

  async fn next(&mut self) -> Result<Option<Delivery>, Unavailable> {
    if self.failures > 0 {
      self.failures -= 1;
      return Err(Unavailable);
    }
    Ok(self.pending.pop_front())
  }

  async fn ack(&mut self, tag: u64) -> Result<(), Unavailable> {
    self.acked.push(tag);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn scratch_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("adt-ingest-{}-{name}", uuid::Uuid::new_v4()))
  }

  #[tokio::test]
  async fn json_lines_skip_blank_lines() {
    let path = scratch_file("blank.jsonl");
    tokio::fs::write(&path, "{\"a\":1}\n\n{\"a\":2}\n").await.unwrap();

    let mut source = JsonLinesSource::open(&path).await.unwrap();
    assert_eq!(source.next().await.unwrap().unwrap().tag, 1);
    assert_eq!(source.next().await.unwrap().unwrap().tag, 3);
    assert!(source.next().await.unwrap().is_none());
  }

  #[tokio::test]
  async fn json_lines_resume_after_last_ack() {
    let path = scratch_file("resume.jsonl");
    tokio::fs::write(&path, "one\ntwo\nthree\n").await.unwrap();

    let mut first = JsonLinesSource::open(&path).await.unwrap();
    let delivery = first.next().await.unwrap().unwrap();
    first.ack(delivery.tag).await.unwrap();
    // Delivered but never acknowledged.
    first.next().await.unwrap().unwrap();
    drop(first);

    let mut second = JsonLinesSource::open(&path).await.unwrap();
    let again = second.next().await.unwrap().unwrap();
    assert_eq!(again, Delivery { tag: 2, body: "two".into() });
  }

  #[tokio::test]
  async fn memory_source_fails_on_request() {
    let mut source = MemorySource::new(["x".to_string()]);
    source.fail_next(1);
    assert!(source.next().await.is_err());
    assert_eq!(source.next().await.unwrap().unwrap().body, "x");
    assert!(source.next().await.unwrap().is_none());
  }
}
