use cvep_core::MarkerEvent;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Stdout, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecorderError {
    /// The channel is gone; nothing further can be recorded.
    #[error("recorder unavailable: {0}")]
    Unavailable(String),
    /// A single marker was lost; the channel is still usable.
    #[error("marker dropped: {0}")]
    Dropped(String),
}

impl RecorderError {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected => RecorderError::Unavailable(err.to_string()),
            _ => RecorderError::Dropped(err.to_string()),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, RecorderError::Unavailable(_))
    }
}

/// Append-only destination for markers.
pub trait MarkerSink {
    fn push(&mut self, event: &MarkerEvent) -> Result<(), RecorderError>;
}

impl<S: MarkerSink + ?Sized> MarkerSink for Box<S> {
    fn push(&mut self, event: &MarkerEvent) -> Result<(), RecorderError> {
        (**self).push(event)
    }
}

/// Keeps every marker in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    events: Arc<Mutex<Vec<MarkerEvent>>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MarkerEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.events().iter().map(MarkerEvent::label).collect()
    }
}

impl MarkerSink for MemoryRecorder {
    fn push(&mut self, event: &MarkerEvent) -> Result<(), RecorderError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| RecorderError::Unavailable("memory recorder poisoned".into()))?;
        events.push(event.clone());
        Ok(())
    }
}

/// One JSON object per line, flushed after every marker.
#[derive(Debug)]
pub struct JsonLinesRecorder<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesRecorder<BufWriter<File>> {
    pub fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl JsonLinesRecorder<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl JsonLinesRecorder<TcpStream> {
    pub fn tcp(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<W: Write> MarkerSink for JsonLinesRecorder<W> {
    fn push(&mut self, event: &MarkerEvent) -> Result<(), RecorderError> {
        let mut line = serde_json::to_vec(event)
            .map_err(|e| RecorderError::Dropped(e.to_string()))?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| RecorderError::from_io(&e))
    }
}

/// Single producer of markers: forwards each event to the sink, in call
/// order, and keeps delivery counts.
#[derive(Debug)]
pub struct MarkerEmitter<S: MarkerSink> {
    sink: S,
    emitted: u64,
    dropped: u64,
}

impl<S: MarkerSink> MarkerEmitter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            emitted: 0,
            dropped: 0,
        }
    }

    /// Delivers one marker. A dropped marker is logged and swallowed; an
    /// unavailable recorder is returned to the caller.
    pub fn emit(&mut self, event: MarkerEvent) -> Result<(), RecorderError> {
        match self.sink.push(&event) {
            Ok(()) => {
                self.emitted += 1;
                debug!(marker = %event.kind, ts = event.timestamp_ns, "marker");
                Ok(())
            }
            Err(err) if err.is_fatal() => {
                error!(marker = %event.kind, %err, "recorder lost");
                Err(err)
            }
            Err(err) => {
                self.dropped += 1;
                warn!(marker = %event.kind, %err, "marker not recorded");
                Ok(())
            }
        }
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvep_core::MarkerKind;

    struct FailingSink(ErrorKind);

    impl MarkerSink for FailingSink {
        fn push(&mut self, _: &MarkerEvent) -> Result<(), RecorderError> {
            Err(RecorderError::from_io(&io::Error::new(self.0, "test")))
        }
    }

    #[test]
    fn json_lines_one_object_per_marker() {
        let mut recorder = JsonLinesRecorder::new(Vec::new());
        recorder
            .push(&MarkerEvent::new(MarkerKind::StimOnset { trial: 3 }, 42))
            .unwrap();
        recorder.push(&MarkerEvent::new(MarkerKind::Abort, 43)).unwrap();
        let text = String::from_utf8(recorder.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["label"], "stim-onset;trial=3");
        assert_eq!(first["timestamp_ns"], 42);
    }

    #[test]
    fn io_errors_split_into_fatal_and_dropped() {
        let fatal = io::Error::new(ErrorKind::BrokenPipe, "gone");
        let minor = io::Error::new(ErrorKind::WouldBlock, "busy");
        assert!(RecorderError::from_io(&fatal).is_fatal());
        assert!(!RecorderError::from_io(&minor).is_fatal());
    }

    #[test]
    fn emitter_swallows_dropped_markers() {
        let mut emitter = MarkerEmitter::new(FailingSink(ErrorKind::TimedOut));
        assert!(emitter.emit(MarkerEvent::new(MarkerKind::Abort, 1)).is_ok());
        assert_eq!(emitter.dropped(), 1);
        assert_eq!(emitter.emitted(), 0);
    }

    #[test]
    fn emitter_surfaces_lost_recorder() {
        let mut emitter = MarkerEmitter::new(FailingSink(ErrorKind::ConnectionReset));
        let err = emitter
            .emit(MarkerEvent::new(MarkerKind::RunStart { run: 1 }, 1))
            .unwrap_err();
        assert!(matches!(err, RecorderError::Unavailable(_)));
    }

    #[test]
    fn memory_recorder_clones_share_events() {
        let recorder = MemoryRecorder::new();
        let mut emitter = MarkerEmitter::new(recorder.clone());
        emitter.emit(MarkerEvent::new(MarkerKind::RunEnd { run: 1 }, 9)).unwrap();
        assert_eq!(recorder.labels(), vec!["run-end;run=1".to_string()]);
    }
}
