// Copyright (c) 2022. Sebastien Soudan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http:www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Observations stored in a delimited text file, one per row: a group
//! indicator column and a measurement column.

use std::convert::Infallible;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use crate::input::InputWarning;
use crate::{Group, Observation};

/// Errors preventing a file from being read at all.
#[derive(Debug, Error)]
pub enum InputError {
    /// The file could not be opened.
    #[error("cannot open {}: {source}", path.display())]
    Open {
        /// the file
        path: PathBuf,
        /// cause
        #[source]
        source: io::Error,
    },
    /// Malformed delimited data or read failure.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// A column selected by name is not in the header.
    #[error("column {0:?} not found in the header")]
    MissingColumn(String),
    /// A column was selected by name in a file without header.
    #[error("column {0:?} is selected by name but the file has no header row")]
    NoHeader(String),
    /// Group and measurement would be read from the same column.
    #[error("group and measurement columns must differ (both are column {0})")]
    SameColumn(usize),
}

/// A column, by zero-based position or by header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// zero-based position
    Index(usize),
    /// header name
    Name(String),
}

impl FromStr for Column {
    type Err = Infallible;

    /// Digits select a position, anything else a header name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<usize>() {
            Ok(index) => Column::Index(index),
            Err(_) => Column::Name(s.to_string()),
        })
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Column::Index(index) => write!(f, "{index}"),
            Column::Name(name) => write!(f, "{name}"),
        }
    }
}

/// How to read a delimited file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// field delimiter
    pub delimiter: u8,
    /// whether the first row holds column names
    pub has_headers: bool,
    /// column holding the group indicator
    pub group_column: Column,
    /// column holding the measurement
    pub value_column: Column,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
            group_column: Column::Index(0),
            value_column: Column::Index(1),
        }
    }
}

/// Observations read from a file, with the rows that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// observations in file order
    pub observations: Vec<Observation<f64>>,
    /// skipped rows
    pub warnings: Vec<InputWarning>,
}

/// Map a group indicator to its group: `0`, `false` and `a` are group A,
/// `1`, `true` and `b` are group B (case-insensitive).
pub fn parse_group_indicator(raw: &str) -> Option<Group> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "0" | "false" | "a" => Some(Group::A),
        "1" | "true" | "b" => Some(Group::B),
        other => match other.parse::<f64>() {
            Ok(x) if x == 0.0 => Some(Group::A),
            Ok(x) if x == 1.0 => Some(Group::B),
            _ => None,
        },
    }
}

fn resolve(column: &Column, headers: Option<&StringRecord>) -> Result<usize, InputError> {
    match column {
        Column::Index(index) => Ok(*index),
        Column::Name(name) => {
            let headers = headers.ok_or_else(|| InputError::NoHeader(name.clone()))?;
            headers
                .iter()
                .position(|header| header == name.as_str())
                .ok_or_else(|| InputError::MissingColumn(name.clone()))
        }
    }
}

fn parse_row(
    record: &StringRecord,
    group_index: usize,
    value_index: usize,
) -> Result<Observation<f64>, String> {
    let raw_group = record
        .get(group_index)
        .ok_or_else(|| format!("no field {group_index} for the group"))?;
    let group = parse_group_indicator(raw_group)
        .ok_or_else(|| format!("unknown group indicator {raw_group:?}"))?;

    let raw_value = record
        .get(value_index)
        .ok_or_else(|| format!("no field {value_index} for the measurement"))?;
    let value = raw_value
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("measurement {raw_value:?} is not a finite number"))?;

    Ok(Observation::new(group, value))
}

/// Read observations from delimited data.
///
/// Rows that cannot be turned into an observation are skipped and reported in
/// [`Dataset::warnings`].
pub fn read_observations<R: io::Read>(
    reader: R,
    options: &ReadOptions,
) -> Result<Dataset, InputError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_headers)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = if options.has_headers {
        Some(reader.headers()?.clone())
    } else {
        None
    };
    let group_index = resolve(&options.group_column, headers.as_ref())?;
    let value_index = resolve(&options.value_column, headers.as_ref())?;
    if group_index == value_index {
        return Err(InputError::SameColumn(group_index));
    }

    let mut dataset = Dataset::default();
    for record in reader.records() {
        let record = record?;
        match parse_row(&record, group_index, value_index) {
            Ok(observation) => dataset.observations.push(observation),
            Err(reason) => {
                let line = record.position().map_or(0, |position| position.line());
                let warning = InputWarning::SkippedRow { line, reason };
                tracing::warn!("{warning}");
                dataset.warnings.push(warning);
            }
        }
    }

    tracing::debug!(
        observations = dataset.observations.len(),
        skipped = dataset.warnings.len(),
        "read observations"
    );

    Ok(dataset)
}

/// Read observations from the delimited file at `path`.
pub fn read_observations_from_path(
    path: impl AsRef<Path>,
    options: &ReadOptions,
) -> Result<Dataset, InputError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| InputError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_observations(io::BufReader::new(file), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split_groups;

    #[test]
    fn test_read_default_columns() {
        let data = "star,measurement\n1,84\n0,81\n1,72\n0,69\n";
        let dataset = read_observations(data.as_bytes(), &ReadOptions::default()).unwrap();

        assert!(dataset.warnings.is_empty());
        let (a, b) = split_groups(&dataset.observations);
        assert_eq!(a, vec![81.0, 69.0]);
        assert_eq!(b, vec![84.0, 72.0]);
    }

    #[test]
    fn test_read_named_columns() {
        let data = "id;measurement;star\nx; 3.5 ;B\ny;-1;a\nz;2e1;TRUE\n";
        let options = ReadOptions {
            delimiter: b';',
            group_column: "star".parse().unwrap(),
            value_column: "measurement".parse().unwrap(),
            ..Default::default()
        };
        let dataset = read_observations(data.as_bytes(), &options).unwrap();

        assert_eq!(
            dataset.observations,
            vec![
                Observation::new(Group::B, 3.5),
                Observation::new(Group::A, -1.0),
                Observation::new(Group::B, 20.0),
            ]
        );
    }

    #[test]
    fn test_read_skips_bad_rows() {
        let data = "star,measurement\n1,5\n2,6\n0,abc\n0,nan\n1\n0,7\n";
        let dataset = read_observations(data.as_bytes(), &ReadOptions::default()).unwrap();

        assert_eq!(
            dataset.observations,
            vec![Observation::new(Group::B, 5.0), Observation::new(Group::A, 7.0)]
        );
        assert_eq!(dataset.warnings.len(), 4);
        assert_eq!(
            dataset.warnings[0],
            InputWarning::SkippedRow {
                line: 3,
                reason: "unknown group indicator \"2\"".to_string()
            }
        );
    }

    #[test]
    fn test_read_without_header() {
        let data = "0,1.5\n1,2.5\n";
        let options = ReadOptions {
            has_headers: false,
            ..Default::default()
        };
        let dataset = read_observations(data.as_bytes(), &options).unwrap();
        assert_eq!(dataset.observations.len(), 2);

        let options = ReadOptions {
            has_headers: false,
            group_column: Column::Name("star".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            read_observations(data.as_bytes(), &options),
            Err(InputError::NoHeader(_))
        ));
    }

    #[test]
    fn test_read_missing_column() {
        let data = "star,measurement\n1,5\n";
        let options = ReadOptions {
            value_column: Column::Name("score".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            read_observations(data.as_bytes(), &options),
            Err(InputError::MissingColumn(name)) if name == "score"
        ));
    }

    #[test]
    fn test_read_same_column() {
        let options = ReadOptions {
            value_column: Column::Index(0),
            ..Default::default()
        };
        assert!(matches!(
            read_observations("a,b\n".as_bytes(), &options),
            Err(InputError::SameColumn(0))
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_observations_from_path(
            "/definitely/not/here.csv",
            &ReadOptions::default(),
        );
        assert!(matches!(result, Err(InputError::Open { .. })));
    }

    #[test]
    fn test_parse_group_indicator() {
        assert_eq!(parse_group_indicator("0"), Some(Group::A));
        assert_eq!(parse_group_indicator(" 1 "), Some(Group::B));
        assert_eq!(parse_group_indicator("1.0"), Some(Group::B));
        assert_eq!(parse_group_indicator("False"), Some(Group::A));
        assert_eq!(parse_group_indicator("b"), Some(Group::B));
        assert_eq!(parse_group_indicator("2"), None);
        assert_eq!(parse_group_indicator(""), None);
    }

    #[test]
    fn test_column_from_str() {
        assert_eq!("2".parse::<Column>().unwrap(), Column::Index(2));
        assert_eq!(
            "star".parse::<Column>().unwrap(),
            Column::Name("star".to_string())
        );
    }
}
