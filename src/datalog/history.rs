use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::TIME_COLUMN;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Unix seconds
    pub x: i64,
    pub y: f64,
}

/// All logged values of one gauge column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySeries {
    pub name: String,
    pub data: Vec<HistoryPoint>,
}

pub(crate) fn split_fields(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\r', '\n']).split(',').collect()
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Parse a measurement log into one series per gauge column.
///
/// Rows whose field count differs from the header are skipped. Of the
/// remaining rows, rows 1, 1 + `every`, 1 + 2 * `every`, ... are kept.
/// Blank values read as `0.0`.
pub fn read_history<R: BufRead>(reader: R, every: usize) -> io::Result<Vec<HistorySeries>> {
    let every = every.max(1);
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Ok(Vec::new()),
    };
    let fieldnames = split_fields(&header);
    let columns: Vec<usize> = fieldnames
        .iter()
        .enumerate()
        .filter(|(_, name)| {
            let name = name.trim();
            !name.is_empty() && name != TIME_COLUMN
        })
        .map(|(i, _)| i)
        .collect();

    let mut series: Vec<HistorySeries> = columns
        .iter()
        .map(|&i| HistorySeries {
            name: fieldnames[i].trim().to_string(),
            data: Vec::new(),
        })
        .collect();

    let mut row_count = 0usize;
    for line in lines {
        let line = line?;
        let fields = split_fields(&line);
        if fields.len() != fieldnames.len() {
            continue;
        }
        row_count += 1;
        if row_count % every != 1 % every {
            continue;
        }

        let x: i64 = fields[0]
            .trim()
            .parse()
            .map_err(|_| invalid_data(format!("Bad timestamp in log row: {:?}", line)))?;
        for (target, &column) in series.iter_mut().zip(&columns) {
            let raw = fields[column].trim();
            let y = if raw.is_empty() {
                0.0
            } else {
                raw.parse()
                    .map_err(|_| invalid_data(format!("Bad value in log row: {:?}", line)))?
            };
            target.data.push(HistoryPoint { x, y });
        }
    }

    Ok(series)
}

pub fn read_history_file(path: impl AsRef<Path>, every: usize) -> io::Result<Vec<HistorySeries>> {
    let file = File::open(path)?;
    read_history(BufReader::new(file), every)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "Seconds, Gauge 1, Gauge 2, Gauge 3, Gauge 4, Gauge 5, Gauge 6\n\
                       100, 1.000E-03, , 3.000E-03, , , \n\
                       101, 2.000E-03, , 3.000E-03, , , \n\
                       102, truncated\n\
                       103, 4.000E-03, , 3.000E-03, , , \n";

    #[test]
    fn test_read_history_all_rows() {
        let series = read_history(LOG.as_bytes(), 1).unwrap();
        assert_eq!(series.len(), 6);
        assert_eq!(series[0].name, "Gauge 1");
        assert_eq!(
            series[0].data,
            vec![
                HistoryPoint { x: 100, y: 1e-3 },
                HistoryPoint { x: 101, y: 2e-3 },
                HistoryPoint { x: 103, y: 4e-3 },
            ]
        );
        assert_eq!(series[1].data[0], HistoryPoint { x: 100, y: 0.0 });
    }

    #[test]
    fn test_read_history_every_nth() {
        let series = read_history(LOG.as_bytes(), 2).unwrap();
        let xs: Vec<i64> = series[0].data.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![100, 103]);
    }

    #[test]
    fn test_read_history_empty() {
        assert!(read_history("".as_bytes(), 100).unwrap().is_empty());
    }
}
