// THEORY:
// The `exporter` writes the detected events as a small, semicolon-delimited table
// that spreadsheet tools open directly: `FrameID;FrameNr;PupaID;X;Y`, one row per
// event in the order the analyzer reported them. Fields containing the delimiter
// are quoted with `|`. An empty event list writes nothing at all.

use crate::core_modules::analyzer::EclosionEvent;
use crate::error::{EclosionError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const DELIMITER: u8 = b';';
const QUOTE: u8 = b'|';

/// One exported row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "FrameID")]
    pub frame_id: String,
    #[serde(rename = "FrameNr")]
    pub frame_nr: usize,
    #[serde(rename = "PupaID")]
    pub pupa_id: usize,
    #[serde(rename = "X")]
    pub x: u32,
    #[serde(rename = "Y")]
    pub y: u32,
}

impl From<&EclosionEvent> for EventRecord {
    fn from(event: &EclosionEvent) -> Self {
        Self {
            frame_id: event.frame_label.clone().unwrap_or_default(),
            frame_nr: event.frame_nr,
            pupa_id: event.object_id,
            x: event.x,
            y: event.y,
        }
    }
}

/// One record per event, same order.
pub fn export(events: &[EclosionEvent]) -> Vec<EventRecord> {
    events.iter().map(EventRecord::from).collect()
}

/// Writes header and rows to `writer`.
pub fn write_csv<W: Write>(writer: W, events: &[EclosionEvent]) -> Result<()> {
    if events.is_empty() {
        return Err(EclosionError::NoEvents);
    }
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .quote(QUOTE)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);
    for record in export(events) {
        info!(
            "ID: {} Frame: {} Pupa: {} X: {} Y: {}",
            record.frame_id, record.frame_nr, record.pupa_id, record.x, record.y
        );
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes `{code}.csv` into `dir` and returns its path.
pub fn save_csv(dir: &Path, code: &str, events: &[EclosionEvent]) -> Result<PathBuf> {
    if events.is_empty() {
        return Err(EclosionError::NoEvents);
    }
    let path = dir.join(format!("{code}.csv"));
    info!("Saving csv file {}", path.display());
    let file = std::fs::File::create(&path)?;
    write_csv(file, events)?;
    Ok(path)
}

/// Reads records written by [`write_csv`].
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<EventRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .quote(QUOTE)
        .from_reader(reader);
    let records = csv_reader
        .deserialize()
        .collect::<std::result::Result<Vec<EventRecord>, csv::Error>>()?;
    Ok(records)
}
