//! Save event streams.

use crate::cli::EventFormat;
use savefmt_pipeline::SaveEvent;
use std::io::{self, BufRead};

/// Reads one event per line, skipping lines that cannot be decoded.
///
/// Lines are taken as raw bytes, so a file name that is not UTF-8 does not stop the
/// stream. Only I/O errors are yielded as errors; they end it.
pub struct EventReader<R> {
    reader: R,
    format: EventFormat,
    line: Vec<u8>,
    line_number: usize,
    failed: bool,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R, format: EventFormat) -> Self {
        Self {
            reader,
            format,
            line: Vec::new(),
            line_number: 0,
            failed: false,
        }
    }

    fn decode(&self) -> Option<SaveEvent> {
        let line = self.line.as_slice();
        match self.format {
            EventFormat::Line => {
                let event = SaveEvent::parse_log_bytes(line);
                if event.is_none() {
                    log::warn!(
                        "event {}: malformed line {:?}",
                        self.line_number,
                        String::from_utf8_lossy(line)
                    );
                }
                event
            }
            EventFormat::Json => match serde_json::from_slice(line) {
                Ok(event) => Some(event),
                Err(err) => {
                    log::warn!("event {}: {}", self.line_number, err);
                    None
                }
            },
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = io::Result<SaveEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
            self.line_number += 1;
            if self.line.trim_ascii().is_empty() {
                continue;
            }
            if let Some(event) = self.decode() {
                log::trace!("event {}: {:?}", self.line_number, event);
                return Some(Ok(event));
            }
        }
    }
}
