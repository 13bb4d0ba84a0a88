use super::DatasetError;
use crate::schema::{array_from_rows, array_rows, columns, FeatureRecord, FeatureSet};
use ndarray::Array2;
use std::io;
use std::path::Path;

/// Ordered feature records sharing one schema, indexed by identifier.
///
/// Identifiers are expected to be unique but this is not enforced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetTable {
    records: Vec<FeatureRecord>,
}

impl DatasetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: FeatureRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.id.as_str())
    }

    /// First record with identifier `id`.
    pub fn get(&self, id: &str) -> Option<&FeatureRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Rows of `self` followed by rows of `other`.
    pub fn concat(mut self, other: DatasetTable) -> Self {
        self.records.extend(other.records);
        self
    }

    /// Write the table as CSV: header row, then one row per record with the
    /// identifier first and each feature as a JSON nested array.
    pub fn write_csv_to<W: io::Write>(&self, writer: W) -> Result<(), DatasetError> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(columns())?;
        for record in &self.records {
            let mut row = Vec::with_capacity(columns().len());
            row.push(record.id.clone());
            for (_, array) in record.features.iter() {
                row.push(encode_cell(array)?);
            }
            out.write_record(&row)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), DatasetError> {
        let file = std::fs::File::create(path)?;
        self.write_csv_to(io::BufWriter::new(file))
    }

    /// Parse a table previously written by [`write_csv`](Self::write_csv).
    pub fn read_csv_from<R: io::Read>(reader: R, origin: &str) -> Result<Self, DatasetError> {
        let mut input = csv::Reader::from_reader(reader);
        let expected = columns();
        let header: Vec<String> = input.headers()?.iter().map(str::to_string).collect();
        if header != expected {
            return Err(DatasetError::Malformed {
                path: origin.to_string(),
                message: format!("expected columns {:?}, found {:?}", expected, header),
            });
        }

        let mut table = Self::new();
        for (line, row) in input.records().enumerate() {
            let row = row?;
            let malformed = |message: String| DatasetError::Malformed {
                path: origin.to_string(),
                message: format!("row {}: {}", line + 1, message),
            };
            let id = row.get(0).ok_or_else(|| malformed("missing id".into()))?;
            let mut cells = row.iter().skip(1);
            let features = FeatureSet::try_from_fn(|feature| {
                let cell = cells
                    .next()
                    .ok_or_else(|| malformed(format!("missing {}", feature.name())))?;
                let array = decode_cell(cell)
                    .map_err(|e| malformed(format!("{}: {}", feature.name(), e)))?;
                if array.nrows() != feature.rows() {
                    return Err(malformed(format!(
                        "{} has {} rows, expected {}",
                        feature.name(),
                        array.nrows(),
                        feature.rows()
                    )));
                }
                Ok(array)
            })?;
            table.push(FeatureRecord::new(id, features));
        }
        Ok(table)
    }

    pub fn read_csv(path: &Path) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path)?;
        Self::read_csv_from(io::BufReader::new(file), &path.display().to_string())
    }
}

fn encode_cell(array: &Array2<f32>) -> Result<String, serde_json::Error> {
    serde_json::to_string(&array_rows(array))
}

fn decode_cell(cell: &str) -> Result<Array2<f32>, String> {
    let rows: Vec<Vec<f32>> = serde_json::from_str(cell).map_err(|e| e.to_string())?;
    array_from_rows(rows).ok_or_else(|| "ragged array".to_string())
}
