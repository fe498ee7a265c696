//! Downsampling of measurement logs for long-term storage and plotting.

use std::io::{self, BufRead, Write};

use super::history::split_fields;
use super::{format_pressure, FIELD_SEPARATOR};

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Copy the header, then every `n`-th data line starting with the first.
pub fn thin_out<R: BufRead, W: Write>(reader: R, mut writer: W, n: usize) -> io::Result<()> {
    let n = n.max(1);
    let mut lines = reader.lines();
    if let Some(header) = lines.next() {
        writeln!(writer, "{}", header?.trim())?;
    }
    for (i, line) in lines.enumerate() {
        let line = line?;
        if i % n == 0 {
            writeln!(writer, "{}", line.trim())?;
        }
    }
    writer.flush()
}

/// Copy the first two lines verbatim, then the `n`-th, `2n`-th, ... of the rest.
pub fn extract_every_nth_line<R: BufRead, W: Write>(
    reader: R,
    mut writer: W,
    n: usize,
) -> io::Result<()> {
    let n = n.max(1);
    let mut lines = reader.lines();
    for _ in 0..2 {
        match lines.next() {
            Some(line) => writeln!(writer, "{}", line?)?,
            None => return writer.flush(),
        }
    }
    for (i, line) in lines.enumerate() {
        let line = line?;
        if (i + 1) % n == 0 {
            writeln!(writer, "{}", line)?;
        }
    }
    writer.flush()
}

/// Average blocks of `n` consecutive-second rows.
///
/// A time jump of more than one second, or time not moving forward, drops
/// the block collected so far. Each emitted row carries the timestamp of the
/// block's middle row. A column with any blank value in the block is blank.
pub fn thin_out_average<R: BufRead, W: Write>(
    reader: R,
    mut writer: W,
    n: usize,
) -> io::Result<()> {
    let n = n.max(1);
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return writer.flush(),
    };
    let field_count = split_fields(&header).len();
    writeln!(writer, "{}", header.trim())?;

    let mut last_time: i64 = 0;
    let mut block: Vec<(i64, Vec<Option<f64>>)> = Vec::with_capacity(n);
    for line in lines {
        let line = line?;
        let fields = split_fields(&line);
        if fields.len() != field_count {
            continue;
        }

        let time: i64 = fields[0]
            .trim()
            .parse()
            .map_err(|_| invalid_data(format!("Bad timestamp in log row: {:?}", line)))?;
        if time > last_time + 1 || time <= last_time {
            block.clear();
        }
        let values = fields[1..]
            .iter()
            .map(|raw| {
                let raw = raw.trim();
                if raw.is_empty() {
                    Ok(None)
                } else {
                    raw.parse::<f64>()
                        .map(Some)
                        .map_err(|_| invalid_data(format!("Bad value in log row: {:?}", line)))
                }
            })
            .collect::<io::Result<Vec<_>>>()?;
        block.push((time, values));
        last_time = time;

        if block.len() == n {
            writeln!(writer, "{}", average_row(&block))?;
            block.clear();
        }
    }
    writer.flush()
}

fn average_row(block: &[(i64, Vec<Option<f64>>)]) -> String {
    let n = block.len();
    let columns = block.first().map_or(0, |(_, values)| values.len());
    let mut fields = vec![block[n / 2].0.to_string()];
    fields.extend((0..columns).map(|column| {
        block
            .iter()
            .map(|(_, values)| values[column])
            .sum::<Option<f64>>()
            .map(|sum| format_pressure(sum / n as f64))
            .unwrap_or_default()
    }));
    fields.join(FIELD_SEPARATOR)
}
