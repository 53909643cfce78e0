//! Synthetic CSV generation, for trying the loader without real data.
//!
//! Files are named after their shape (`sample_<rows>_<str>_<dbl>.csv`), so
//! generating the same shape twice overwrites the earlier file.

use rand::Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{LoaderError, Result};

pub const MAX_SAMPLE_ROWS: usize = 1_000_000;

/// How `dbl_*` columns are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// `[0, 1)`
    #[default]
    Uniform,
    /// Standard normal, mean 0 and stddev 1.
    Normal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleSpec {
    #[serde(default)]
    pub rows: usize,
    #[serde(default)]
    pub string_cols: usize,
    #[serde(default)]
    pub double_cols: usize,
    #[serde(default)]
    pub distribution: Distribution,
}

impl SampleSpec {
    fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.rows > MAX_SAMPLE_ROWS {
            return Err(LoaderError::InvalidArgument(format!(
                "rows must be between 1 and {}",
                MAX_SAMPLE_ROWS
            )));
        }
        if self.string_cols + self.double_cols == 0 {
            return Err(LoaderError::InvalidArgument(
                "at least one column is required".to_string(),
            ));
        }
        Ok(())
    }

    fn headers(&self) -> Vec<String> {
        (1..=self.string_cols)
            .map(|i| format!("str_{}", i))
            .chain((1..=self.double_cols).map(|i| format!("dbl_{}", i)))
            .collect()
    }
}

/// Writes a random CSV into `dir` (created if needed) and returns its path.
pub fn generate_sample_csv(dir: &Path, spec: &SampleSpec) -> Result<PathBuf> {
    spec.validate()?;
    std::fs::create_dir_all(dir)?;

    let path = dir.join(format!(
        "sample_{}_{}_{}.csv",
        spec.rows, spec.string_cols, spec.double_cols
    ));

    let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
    writer.write_record(spec.headers()).map_err(csv_error)?;

    let mut rng = rand::thread_rng();
    let mut record = Vec::with_capacity(spec.string_cols + spec.double_cols);
    for _ in 0..spec.rows {
        record.clear();
        for _ in 0..spec.string_cols {
            record.push(random_word(&mut rng));
        }
        for _ in 0..spec.double_cols {
            record.push(random_double(&mut rng, spec.distribution).to_string());
        }
        writer.write_record(&record).map_err(csv_error)?;
    }
    writer.flush()?;

    info!(
        path = %path.display(),
        rows = spec.rows,
        string_cols = spec.string_cols,
        double_cols = spec.double_cols,
        "Generated sample CSV"
    );
    Ok(path)
}

fn random_word(rng: &mut impl Rng) -> String {
    (0..8).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

fn random_double(rng: &mut impl Rng, distribution: Distribution) -> f64 {
    match distribution {
        Distribution::Uniform => rng.gen::<f64>(),
        Distribution::Normal => {
            // Box-Muller; 1 - u keeps the log argument in (0, 1].
            let u1 = 1.0 - rng.gen::<f64>();
            let u2 = rng.gen::<f64>();
            (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
        }
    }
}

fn csv_error(e: csv::Error) -> LoaderError {
    LoaderError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spec(rows: usize, string_cols: usize, double_cols: usize) -> SampleSpec {
        SampleSpec {
            rows,
            string_cols,
            double_cols,
            distribution: Distribution::Uniform,
        }
    }

    #[test]
    fn test_generates_header_and_rows() {
        let tmp = TempDir::new().unwrap();
        let path = generate_sample_csv(tmp.path(), &spec(5, 2, 1)).unwrap();
        assert_eq!(path.file_name().unwrap(), "sample_5_2_1.csv");

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["str_1", "str_2", "dbl_1"]);

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 5);
        for record in &records {
            assert_eq!(record[0].len(), 8);
            assert!(record[0].chars().all(|c| c.is_ascii_lowercase()));
            let v: f64 = record[2].parse().unwrap();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_normal_distribution_values_parse() {
        let tmp = TempDir::new().unwrap();
        let mut s = spec(200, 0, 1);
        s.distribution = Distribution::Normal;
        let path = generate_sample_csv(tmp.path(), &s).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let values: Vec<f64> = reader
            .records()
            .map(|r| r.unwrap()[0].parse().unwrap())
            .collect();
        assert_eq!(values.len(), 200);
        assert!(values.iter().all(|v| v.is_finite()));
        assert!(values.iter().any(|v| *v < 0.0));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let tmp = TempDir::new().unwrap();
        assert!(generate_sample_csv(tmp.path(), &spec(0, 1, 1)).is_err());
        assert!(generate_sample_csv(tmp.path(), &spec(MAX_SAMPLE_ROWS + 1, 1, 0)).is_err());
        assert!(generate_sample_csv(tmp.path(), &spec(10, 0, 0)).is_err());
    }

    #[test]
    fn test_distribution_deserializes_lowercase() {
        let s: SampleSpec =
            serde_json::from_str(r#"{"rows": 3, "double_cols": 2, "distribution": "normal"}"#)
                .unwrap();
        assert_eq!(s.distribution, Distribution::Normal);
        assert_eq!(s.string_cols, 0);
    }
}
