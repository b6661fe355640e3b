//! Labelled dataset loading and stratified splitting.
//!
//! Reads the credit card CSV (30 feature columns plus `Class`) into
//! validated records. Columns are located by header name, so the file's own
//! column order does not matter; records always come out in contract order.

use crate::error::DatasetError;
use crate::types::{Label, TransactionRecord, FEATURE_COUNT, FEATURE_NAMES};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

/// Name of the label column.
pub const LABEL_COLUMN: &str = "Class";

/// Records with their ground-truth labels, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<TransactionRecord>,
    labels: Vec<Label>,
}

/// Result of a train/test split.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

/// Row counts per label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub legitimate: usize,
    pub fraud: usize,
}

impl ClassCounts {
    pub fn total(&self) -> usize {
        self.legitimate + self.fraud
    }
}

/// Load a labelled CSV file.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Dataset, DatasetError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = read_csv(BufReader::new(file))?;

    let counts = dataset.class_counts();
    info!(
        path = %path.display(),
        rows = dataset.len(),
        fraud = counts.fraud,
        "Dataset loaded"
    );
    Ok(dataset)
}

/// Parse labelled CSV from any reader.
pub fn read_csv<R: Read>(reader: R) -> Result<Dataset, DatasetError> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();

    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or(DatasetError::MissingColumn(name))
    };

    let mut feature_columns = [0_usize; FEATURE_COUNT];
    for (slot, &name) in feature_columns.iter_mut().zip(FEATURE_NAMES.iter()) {
        *slot = column(name)?;
    }
    let label_column = column(LABEL_COLUMN)?;

    let mut dataset = Dataset::default();
    for (index, result) in reader.records().enumerate() {
        let row = result?;
        // 1-based, counting the header line
        let line = index + 2;

        let mut values = [0.0_f64; FEATURE_COUNT];
        for ((slot, &col), &name) in values
            .iter_mut()
            .zip(feature_columns.iter())
            .zip(FEATURE_NAMES.iter())
        {
            let raw = row.get(col).unwrap_or("").trim();
            *slot = raw.parse().map_err(|_| DatasetError::InvalidValue {
                row: line,
                column: name,
                value: raw.to_string(),
            })?;
        }

        let record = TransactionRecord::from_values(values)
            .map_err(|source| DatasetError::InvalidRecord { row: line, source })?;

        let raw_label = row.get(label_column).unwrap_or("").trim();
        let label = parse_label(raw_label).ok_or_else(|| DatasetError::InvalidLabel {
            row: line,
            value: raw_label.to_string(),
        })?;

        dataset.push(record, label);
    }

    if dataset.is_empty() {
        return Err(DatasetError::Empty);
    }
    Ok(dataset)
}

/// Labels appear as `0`, `1`, `0.0` or `1.0`.
fn parse_label(raw: &str) -> Option<Label> {
    let value: f64 = raw.parse().ok()?;
    if value == 0.0 {
        Some(Label::Legitimate)
    } else if value == 1.0 {
        Some(Label::Fraud)
    } else {
        None
    }
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TransactionRecord, label: Label) {
        self.records.push(record);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TransactionRecord, Label)> + '_ {
        self.records.iter().zip(self.labels.iter().copied())
    }

    pub fn class_counts(&self) -> ClassCounts {
        let fraud = self.labels.iter().filter(|l| l.is_fraud()).count();
        ClassCounts {
            legitimate: self.labels.len() - fraud,
            fraud,
        }
    }

    /// Stratified, seeded split into train and test partitions.
    ///
    /// Each label keeps roughly `test_size` of its rows in the test
    /// partition, with at least one row on each side. Rows keep their
    /// original relative order within a partition.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<Split, DatasetError> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(DatasetError::InvalidTestSize(test_size));
        }
        if self.is_empty() {
            return Err(DatasetError::Empty);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train_idx = Vec::with_capacity(self.len());
        let mut test_idx = Vec::new();

        for label in [Label::Legitimate, Label::Fraud] {
            let mut indices: Vec<usize> = self
                .labels
                .iter()
                .enumerate()
                .filter(|(_, l)| **l == label)
                .map(|(i, _)| i)
                .collect();

            if indices.is_empty() {
                continue;
            }
            if indices.len() < 2 {
                return Err(DatasetError::TooFewSamples {
                    label: label.as_u8(),
                    count: indices.len(),
                });
            }

            indices.shuffle(&mut rng);
            let n_test = ((indices.len() as f64 * test_size).round() as usize)
                .clamp(1, indices.len() - 1);
            test_idx.extend_from_slice(&indices[..n_test]);
            train_idx.extend_from_slice(&indices[n_test..]);
        }

        train_idx.sort_unstable();
        test_idx.sort_unstable();

        Ok(Split {
            train: self.subset(&train_idx),
            test: self.subset(&test_idx),
        })
    }

    fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            records: indices.iter().map(|&i| self.records[i]).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn header() -> String {
        // Raw dataset layout: Time, V1..V28, Amount, Class
        let mut columns = vec!["Time".to_string()];
        columns.extend((1..=28).map(|i| format!("V{}", i)));
        columns.push("Amount".to_string());
        columns.push("Class".to_string());
        columns
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn row(time: f64, v14: f64, amount: f64, class: &str) -> String {
        let mut values = vec![time.to_string()];
        values.extend((1..=28).map(|i| if i == 14 { v14.to_string() } else { "0.5".to_string() }));
        values.push(amount.to_string());
        values.push(format!("\"{}\"", class));
        values.join(",")
    }

    fn synthetic(legitimate: usize, fraud: usize) -> Dataset {
        let mut dataset = Dataset::new();
        for i in 0..legitimate {
            let record = TransactionRecord::neutral(i as f64).unwrap();
            dataset.push(record, Label::Legitimate);
        }
        for i in 0..fraud {
            let record = TransactionRecord::neutral(10_000.0 + i as f64).unwrap();
            dataset.push(record, Label::Fraud);
        }
        dataset
    }

    #[test]
    fn test_read_csv_maps_columns_by_name() {
        let csv = format!(
            "{}\n{}\n{}\n",
            header(),
            row(0.0, -1.2, 149.62, "0"),
            row(406.0, -9.5, 0.0, "1")
        );
        let dataset = read_csv(csv.as_bytes()).unwrap();

        assert_eq!(dataset.len(), 2);
        let first = &dataset.records()[0];
        assert_eq!(first.amount(), 149.62);
        assert_eq!(first.get("V14"), Some(-1.2));
        assert_eq!(first.get("V1"), Some(0.5));
        assert_eq!(dataset.records()[1].time(), 406.0);
        assert_eq!(dataset.labels(), &[Label::Legitimate, Label::Fraud]);
        assert_eq!(dataset.class_counts(), ClassCounts { legitimate: 1, fraud: 1 });
    }

    #[test]
    fn test_read_csv_missing_column() {
        let csv = "Time,Amount,Class\n0,1,0\n";
        let err = read_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn("V1")));
    }

    #[test]
    fn test_read_csv_reports_row() {
        let csv = format!(
            "{}\n{}\n{}\n",
            header(),
            row(0.0, 0.0, 10.0, "0"),
            row(1.0, 0.0, 10.0, "2")
        );
        let err = read_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidLabel { row: 3, .. }));

        let bad_value = format!("{}\n{}\n", header(), row(0.0, 0.0, 10.0, "0").replacen("0.5", "x", 1));
        let err = read_csv(bad_value.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidValue { row: 2, column: "V1", .. }));
    }

    #[test]
    fn test_read_csv_empty() {
        let csv = format!("{}\n", header());
        assert!(matches!(read_csv(csv.as_bytes()), Err(DatasetError::Empty)));
    }

    #[test]
    fn test_load_csv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", header()).unwrap();
        writeln!(file, "{}", row(0.0, 0.0, 2.69, "0")).unwrap();
        let dataset = load_csv(file.path()).unwrap();
        assert_eq!(dataset.len(), 1);

        assert!(matches!(
            load_csv("/nonexistent/creditcard.csv"),
            Err(DatasetError::Io { .. })
        ));
    }

    #[test]
    fn test_split_is_stratified() {
        let dataset = synthetic(90, 10);
        let split = dataset.train_test_split(0.2, 42).unwrap();

        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        assert_eq!(split.test.class_counts(), ClassCounts { legitimate: 18, fraud: 2 });
        assert_eq!(split.train.class_counts(), ClassCounts { legitimate: 72, fraud: 8 });
    }

    #[test]
    fn test_split_is_reproducible() {
        let dataset = synthetic(50, 6);
        let a = dataset.train_test_split(0.25, 7).unwrap();
        let b = dataset.train_test_split(0.25, 7).unwrap();
        assert_eq!(a.test.records(), b.test.records());
        assert_eq!(a.train.labels(), b.train.labels());
    }

    #[test]
    fn test_split_keeps_rare_class_on_both_sides() {
        let dataset = synthetic(100, 2);
        let split = dataset.train_test_split(0.1, 1).unwrap();
        assert_eq!(split.test.class_counts().fraud, 1);
        assert_eq!(split.train.class_counts().fraud, 1);
    }

    #[test]
    fn test_split_rejects_bad_input() {
        let dataset = synthetic(10, 1);
        assert!(matches!(
            dataset.train_test_split(0.2, 0),
            Err(DatasetError::TooFewSamples { label: 1, count: 1 })
        ));
        assert!(matches!(
            synthetic(10, 10).train_test_split(1.0, 0),
            Err(DatasetError::InvalidTestSize(_))
        ));
        assert!(matches!(
            Dataset::new().train_test_split(0.2, 0),
            Err(DatasetError::Empty)
        ));
    }
}
