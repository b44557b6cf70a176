//! Game Log
//!
//! Each game buffers its own lines in a [`GameLog`]; one [`LogWriter`] task
//! per run owns the file. Games run concurrently, but the file reads one
//! whole game at a time: the first game to write owns the file until it
//! saves, and chunks from other games wait in memory until then.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use agent_core::LogSink;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::LogError;

#[derive(Debug)]
enum LogEvent {
    Chunk { game: u64, lines: Vec<String> },
    Finish { game: u64 },
}

#[derive(Debug, Default)]
struct Buffer {
    lines: Vec<String>,
    flushed: usize,
}

/// Per-game line buffer. Cheap to clone; clones share the buffer.
#[derive(Clone, Debug)]
pub struct GameLog {
    game: u64,
    disabled: bool,
    buffer: Arc<Mutex<Buffer>>,
    tx: Option<mpsc::UnboundedSender<LogEvent>>,
}

impl GameLog {
    /// Keeps lines in memory only
    pub fn detached(game: u64) -> Self {
        Self {
            game,
            disabled: false,
            buffer: Arc::default(),
            tx: None,
        }
    }

    /// Drops every line
    pub fn disabled(game: u64) -> Self {
        Self {
            disabled: true,
            ..Self::detached(game)
        }
    }

    pub fn game(&self) -> u64 {
        self.game
    }

    /// Everything added so far, flushed or not
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, event: LogEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::warn!(game = self.game, "Log writer closed, dropping game log lines");
            }
        }
    }
}

impl LogSink for GameLog {
    fn add(&self, line: String) {
        if self.disabled {
            return;
        }
        self.lock().lines.push(line);
    }

    /// Hand lines not yet flushed to the writer as one chunk
    fn flush(&self) {
        if self.disabled {
            return;
        }
        let pending = {
            let mut buffer = self.lock();
            let pending = buffer.lines[buffer.flushed..].to_vec();
            buffer.flushed = buffer.lines.len();
            pending
        };
        if !pending.is_empty() {
            self.send(LogEvent::Chunk {
                game: self.game,
                lines: pending,
            });
        }
    }

    /// Flush and release the file to the next game
    fn save(&self) {
        if self.disabled {
            return;
        }
        self.flush();
        self.send(LogEvent::Finish { game: self.game });
    }
}

/// Totals reported when the writer shuts down
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Games that wrote at least one line
    pub games: usize,

    /// Lines written, header excluded
    pub lines: usize,
}

#[derive(Debug)]
struct Waiting {
    game: u64,
    lines: Vec<String>,
    finished: bool,
}

/// Decides which lines may go to the file now. Pure; the writer task does
/// the I/O.
#[derive(Debug, Default)]
struct Collator {
    owner: Option<u64>,
    waiting: Vec<Waiting>,
    seen: HashSet<u64>,
}

impl Collator {
    fn chunk(&mut self, game: u64, lines: Vec<String>) -> Vec<String> {
        self.seen.insert(game);
        match self.owner {
            None => {
                self.owner = Some(game);
                lines
            }
            Some(owner) if owner == game => lines,
            Some(_) => {
                match self.waiting.iter_mut().find(|w| w.game == game) {
                    Some(w) => w.lines.extend(lines),
                    None => self.waiting.push(Waiting {
                        game,
                        lines,
                        finished: false,
                    }),
                }
                Vec::new()
            }
        }
    }

    fn finish(&mut self, game: u64) -> Vec<String> {
        if self.owner != Some(game) {
            if let Some(w) = self.waiting.iter_mut().find(|w| w.game == game) {
                w.finished = true;
            }
            return Vec::new();
        }

        self.owner = None;
        let (done, open): (Vec<Waiting>, Vec<Waiting>) =
            std::mem::take(&mut self.waiting).into_iter().partition(|w| w.finished);
        let mut out: Vec<String> = done.into_iter().flat_map(|w| w.lines).collect();

        let mut open = open.into_iter();
        if let Some(next) = open.next() {
            self.owner = Some(next.game);
            out.extend(next.lines);
        }
        self.waiting = open.collect();
        out
    }

    /// Everything still buffered, finished games first
    fn drain(&mut self) -> Vec<String> {
        let (done, open): (Vec<Waiting>, Vec<Waiting>) =
            std::mem::take(&mut self.waiting).into_iter().partition(|w| w.finished);
        self.owner = None;
        done.into_iter().chain(open).flat_map(|w| w.lines).collect()
    }
}

/// Single writer for one run's log file
#[derive(Debug)]
pub struct LogWriter {
    tx: mpsc::UnboundedSender<LogEvent>,
    task: JoinHandle<Result<WriterStats, std::io::Error>>,
}

impl LogWriter {
    /// Truncate `path`, write `header` as its first line, and start the
    /// writer task
    pub async fn create(path: impl AsRef<Path>, header: &str) -> Result<Self, LogError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await?;
        let mut out = BufWriter::new(file);
        out.write_all(format!("{header}\n").as_bytes()).await?;
        out.flush().await?;

        tracing::info!(path = %path.display(), "Game log opened");
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::run(out, rx));
        Ok(Self { tx, task })
    }

    /// Log handle for game number `game`
    pub fn game_log(&self, game: u64) -> GameLog {
        GameLog {
            tx: Some(self.tx.clone()),
            ..GameLog::detached(game)
        }
    }

    /// Wait for every [`GameLog`] to be dropped, write what is left, and
    /// report totals
    pub async fn close(self) -> Result<WriterStats, LogError> {
        drop(self.tx);
        let stats = self.task.await??;
        tracing::info!(games = stats.games, lines = stats.lines, "Game log closed");
        Ok(stats)
    }

    async fn run(
        mut out: BufWriter<tokio::fs::File>,
        mut rx: mpsc::UnboundedReceiver<LogEvent>,
    ) -> Result<WriterStats, std::io::Error> {
        let mut collator = Collator::default();
        let mut stats = WriterStats::default();

        while let Some(event) = rx.recv().await {
            let lines = match event {
                LogEvent::Chunk { game, lines } => collator.chunk(game, lines),
                LogEvent::Finish { game } => collator.finish(game),
            };
            stats.lines += write_lines(&mut out, &lines).await?;
        }

        let rest = collator.drain();
        stats.lines += write_lines(&mut out, &rest).await?;
        stats.games = collator.seen.len();
        Ok(stats)
    }
}

async fn write_lines(out: &mut BufWriter<tokio::fs::File>, lines: &[String]) -> Result<usize, std::io::Error> {
    if lines.is_empty() {
        return Ok(0);
    }
    for line in lines {
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    out.flush().await?;
    Ok(lines.len())
}
