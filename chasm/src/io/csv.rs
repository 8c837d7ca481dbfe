//! This module implements reading and writing tables as comma-separated values.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Write},
    path::Path,
};

use chasm_physical::{
    dictionary::Dictionary,
    tabular::{segment_writer::SegmentWriter, Segment},
};
use csv::{Reader, ReaderBuilder, Writer, WriterBuilder};
use streaming_iterator::StreamingIterator;

use crate::error::Error;

/// Wrap an arbitrary [Read] into a headerless csv [Reader].
fn reader<R>(rdr: R) -> Reader<R>
where
    R: Read,
{
    ReaderBuilder::new()
        .delimiter(b',')
        .escape(Some(b'\\'))
        .has_headers(false)
        .double_quote(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr)
}

/// Read rows of `arity` fields, adding every field to the dictionary.
///
/// Records with a different number of fields are skipped.
/// The result is sorted and free of duplicates.
pub fn read_segment<R: Read>(
    rdr: R,
    arity: usize,
    dictionary: &mut Dictionary,
) -> Result<Segment, Error> {
    let mut reader = reader(rdr);
    let mut writer = SegmentWriter::new(arity, 0);
    let mut skipped = 0;
    let mut row = Vec::with_capacity(arity);

    for record in reader.records() {
        let record = record?;
        if record.len() != arity {
            skipped += 1;
            continue;
        }

        row.clear();
        row.extend(record.iter().map(|field| dictionary.add(field)));
        writer.add_row(&row)?;
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} records that do not have {arity} fields");
    }

    Ok(writer.finalize().sorted_and_unique())
}

/// Load a headerless csv file whose rows have `arity` fields.
pub fn load_csv(path: &Path, arity: usize, dictionary: &mut Dictionary) -> Result<Segment, Error> {
    let file = File::open(path).map_err(|error| Error::IOReading {
        error,
        filename: path.to_path_buf(),
    })?;

    let segment = read_segment(file, arity, dictionary)?;
    log::info!("Loaded {} rows from {}", segment.len(), path.display());

    Ok(segment)
}

/// Write the rows of a segment, resolving terms with the dictionary.
pub fn write_segment<W: Write>(
    wtr: W,
    segment: &Segment,
    dictionary: &Dictionary,
) -> Result<(), Error> {
    let mut writer: Writer<W> = WriterBuilder::new()
        .delimiter(b',')
        .double_quote(true)
        .has_headers(false)
        .from_writer(wtr);

    let mut rows = segment.reader();
    while let Some(row) = rows.next() {
        writer.write_record(row.iter().map(|&term| dictionary.display(term)))?;
    }
    writer.flush()?;

    Ok(())
}

/// Write a segment into a csv file.
///
/// Fails with [Error::IOExists] if the file exists and `overwrite` is not set.
pub fn write_csv(
    path: &Path,
    segment: &Segment,
    dictionary: &Dictionary,
    overwrite: bool,
) -> Result<(), Error> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let file = options.open(path).map_err(|error| match error.kind() {
        std::io::ErrorKind::AlreadyExists => Error::IOExists(path.to_path_buf()),
        _ => Error::IO(error),
    })?;

    write_segment(file, segment, dictionary)
}
