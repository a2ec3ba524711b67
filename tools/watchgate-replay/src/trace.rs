//! Visitor trace format.
//!
//! A trace is CSV with a header row and one visitor action per line:
//!
//! ```text
//! t_ms,event,value
//! 0,click,
//! 40000,pause,
//! 45000,hide,
//! 50000,show,
//! 52000,play,
//! 60000,seek,50
//! ```
//!
//! `t_ms` is milliseconds since the page was mounted and must not go
//! backwards. `value` is only used by `seek`, as a percentage of the
//! video.

use std::io::Read;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEvent {
    /// Visitor pressed play on the poster; binds the player.
    Click,
    Play,
    Pause,
    End,
    Hide,
    Show,
    Seek,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TraceRow {
    pub t_ms: u64,
    pub event: TraceEvent,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("line {line}: time goes backwards ({t_ms} ms after {previous_ms} ms)")]
    OutOfOrder {
        line: usize,
        t_ms: u64,
        previous_ms: u64,
    },

    #[error("line {line}: seek needs a percentage in the value column")]
    MissingValue { line: usize },
}

/// Read and check a whole trace.
pub fn read<R: Read>(reader: R) -> Result<Vec<TraceRow>, TraceError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows: Vec<TraceRow> = Vec::new();
    for (index, record) in csv.deserialize().enumerate() {
        let row: TraceRow = record?;
        // Header is line 1.
        let line = index + 2;

        let previous_ms = rows.last().map_or(0, |previous| previous.t_ms);
        if row.t_ms < previous_ms {
            return Err(TraceError::OutOfOrder {
                line,
                t_ms: row.t_ms,
                previous_ms,
            });
        }
        if row.event == TraceEvent::Seek && row.value.is_none() {
            return Err(TraceError::MissingValue { line });
        }

        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_with_and_without_value() {
        let trace = "t_ms,event,value\n0,click,\n1500,seek,25\n2000,pause\n";
        let rows = read(trace.as_bytes()).unwrap();

        assert_eq!(
            rows,
            vec![
                TraceRow {
                    t_ms: 0,
                    event: TraceEvent::Click,
                    value: None
                },
                TraceRow {
                    t_ms: 1500,
                    event: TraceEvent::Seek,
                    value: Some(25.0)
                },
                TraceRow {
                    t_ms: 2000,
                    event: TraceEvent::Pause,
                    value: None
                },
            ]
        );
    }

    #[test]
    fn rejects_time_going_backwards() {
        let trace = "t_ms,event,value\n1000,play,\n500,pause,\n";
        let err = read(trace.as_bytes()).unwrap_err();

        assert!(matches!(
            err,
            TraceError::OutOfOrder {
                line: 3,
                t_ms: 500,
                previous_ms: 1000
            }
        ));
    }

    #[test]
    fn rejects_seek_without_value() {
        let trace = "t_ms,event,value\n0,seek,\n";
        assert!(matches!(
            read(trace.as_bytes()),
            Err(TraceError::MissingValue { line: 2 })
        ));
    }

    #[test]
    fn rejects_unknown_event() {
        let trace = "t_ms,event,value\n0,rewind,\n";
        assert!(matches!(read(trace.as_bytes()), Err(TraceError::Csv(_))));
    }
}
