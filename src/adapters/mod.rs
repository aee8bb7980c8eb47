// Adapters layer: CSV readers and writers for the history, template and submission files.

pub mod history;
pub mod submission;
pub mod template;

use csv::StringRecord;

/// Position of `name` in `headers`, compared after trimming.
pub(crate) fn column_index(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name.trim())
}

pub(crate) fn reader(data: &[u8]) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data)
}
