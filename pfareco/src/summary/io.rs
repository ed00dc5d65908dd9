use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Mutex;
use serde::{Deserialize, Serialize};
use crate::error::Result;
use crate::summary::extract::EventSummary;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SummaryFormat {
    Json,
    Bincode,
    BincodeZstd,
}

impl SummaryFormat {
    /// `.json` → JSON, `.zst` → zstd-compressed bincode, anything else → plain bincode.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SummaryFormat::Json,
            Some("zst") => SummaryFormat::BincodeZstd,
            _ => SummaryFormat::Bincode,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct SummaryFile {
    pub version: u32,
    pub events: Vec<EventSummary>,
}

impl SummaryFile {
    pub fn new(events: Vec<EventSummary>) -> Self {
        Self { version: 1, events }
    }
}

/// Append-only store of event summaries, written once at job end.
#[derive(Debug, Default)]
pub struct SummaryAccumulator {
    events: Vec<EventSummary>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, summary: EventSummary) {
        self.events.push(summary);
    }

    pub fn events(&self) -> &[EventSummary] {
        &self.events
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.events.iter().map(|e| e.particles.len()).sum()
    }

    /// Stable sort by run and event number.
    pub fn sort_by_event(&mut self) {
        self.events.sort_by_key(|e| (e.run, e.event));
    }

    pub fn into_events(self) -> Vec<EventSummary> {
        self.events
    }

    pub fn flush<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save(path.as_ref(), &self.events)
    }
}

/// Accumulator shared between events in flight; appends are serialized by a lock.
#[derive(Debug, Default)]
pub struct SharedAccumulator {
    inner: Mutex<SummaryAccumulator>,
}

impl SharedAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, summary: EventSummary) {
        // a poisoned lock only means another event panicked mid-append
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.record(summary);
    }

    pub fn into_inner(self) -> SummaryAccumulator {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn save(path: &Path, events: &[EventSummary]) -> Result<()> {
    let f = File::create(path)?;
    let sf = SummaryFile::new(events.to_vec());
    match SummaryFormat::from_path(path) {
        SummaryFormat::Json => {
            serde_json::to_writer_pretty(BufWriter::new(f), &sf)?;
        }
        SummaryFormat::Bincode => {
            let mut bw = BufWriter::new(f);
            bincode::serialize_into(&mut bw, &sf)?;
        }
        SummaryFormat::BincodeZstd => {
            let mut zw = zstd::Encoder::new(f, 3)?;
            bincode::serialize_into(&mut zw, &sf)?;
            zw.finish()?;
        }
    }
    Ok(())
}

pub fn load(path: &Path) -> Result<Vec<EventSummary>> {
    let f = File::open(path)?;
    let sf: SummaryFile = match SummaryFormat::from_path(path) {
        SummaryFormat::Json => serde_json::from_reader(BufReader::new(f))?,
        SummaryFormat::Bincode => bincode::deserialize_from(BufReader::new(f))?,
        SummaryFormat::BincodeZstd => {
            let zr = zstd::Decoder::new(f)?;
            bincode::deserialize_from(zr)?
        }
    };
    Ok(sf.events)
}
