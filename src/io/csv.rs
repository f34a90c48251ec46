use crate::error::Result;
use crate::grid::assign_nodes;
use crate::network::{NetworkModel, Reach, Segment};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Input columns a row type does not model, as `(header, raw value)` in input order.
pub type ExtraColumns = Vec<(String, String)>;

/// A table row that carries the columns it does not model through a
/// load/save cycle.
pub trait TableRow: Serialize + DeserializeOwned {
    fn extra(&self) -> &ExtraColumns;
    fn extra_mut(&mut self) -> &mut ExtraColumns;
}

// Header and values of one row as the serde writer lays them out
fn serialize_row<T: Serialize>(row: &T) -> Result<(StringRecord, StringRecord)> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    wtr.serialize(row)?;
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(bytes.as_slice());
    let mut records = rdr.records();
    let header = records.next().transpose()?.unwrap_or_default();
    let values = records.next().transpose()?.unwrap_or_default();
    Ok((header, values))
}

/// Reads every row of a table. Columns the row type does not name are kept
/// in [`TableRow::extra`].
pub fn read_table<T: TableRow, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut parsed = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row: T = record.deserialize(Some(&headers))?;
        parsed.push((row, record));
    }

    let Some((first, _)) = parsed.first() else {
        return Ok(Vec::new());
    };
    let (known, _) = serialize_row(first)?;
    let extra: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !known.iter().any(|k| k == *h))
        .map(|(i, _)| i)
        .collect();
    if !extra.is_empty() {
        debug!(
            "Carrying {} unmodeled columns: {:?}",
            extra.len(),
            extra.iter().map(|&i| &headers[i]).collect::<Vec<_>>()
        );
    }

    Ok(parsed
        .into_iter()
        .map(|(mut row, record)| {
            *row.extra_mut() = extra
                .iter()
                .map(|&i| (headers[i].to_string(), record.get(i).unwrap_or("").to_string()))
                .collect();
            row
        })
        .collect())
}

/// Writes the modeled columns followed by every carried column, in the
/// order first seen.
pub fn write_table<T: TableRow, W: Write>(rows: &[T], writer: W) -> Result<()> {
    let mut extra_columns: Vec<&str> = Vec::new();
    for row in rows {
        for (name, _) in row.extra() {
            if !extra_columns.contains(&name.as_str()) {
                extra_columns.push(name);
            }
        }
    }

    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    for (i, row) in rows.iter().enumerate() {
        let (header, values) = serialize_row(row)?;
        if i == 0 {
            wtr.write_record(header.iter().chain(extra_columns.iter().copied()))?;
        }
        let carried = extra_columns.iter().map(|&name| {
            row.extra()
                .iter()
                .find(|(n, _)| n == name)
                .map_or("", |(_, v)| v.as_str())
        });
        wtr.write_record(values.iter().chain(carried))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes output-only rows such as profiles or summaries.
pub fn write_rows<T: Serialize, W: Write>(rows: &[T], writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_table_path<T: TableRow>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let rows = read_table(BufReader::new(file))?;
    info!("Loaded {} rows from {:?}", rows.len(), path);
    Ok(rows)
}

pub fn write_table_path<T: TableRow>(rows: &[T], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_table(rows, file)?;
    info!("Saved {} rows to {:?}", rows.len(), path);
    Ok(())
}

pub fn write_rows_path<T: Serialize>(rows: &[T], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    write_rows(rows, file)?;
    info!("Saved {} rows to {:?}", rows.len(), path);
    Ok(())
}

/// Loads the reach (Mat1) and segment (Mat2) tables into a validated network.
///
/// Reaches without a node number get one from `row` and `column` when the
/// grid column count is known.
pub fn load_network(
    reach_table: &Path,
    segment_table: &Path,
    ncol: Option<u32>,
) -> Result<NetworkModel> {
    let mut reaches: Vec<Reach> = read_table_path(reach_table)?;
    assign_nodes(&mut reaches, ncol)?;
    let segments: Vec<Segment> = read_table_path(segment_table)?;
    NetworkModel::new(reaches, segments)
}
