//! Reference dataset loader.
//!
//! Reads a headered CSV into the `ReferenceTable` the feature space is built
//! from. Cells may hold encoded numbers or raw category / flag values; empty
//! cells are missing values.

use crate::encoding::{AttributeKind, AttributeSchema, AttributeSpec};
use crate::error::ArtifactError;
use limelight_core::{ReferenceColumn, ReferenceTable};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

/// Load the reference table for `schema` from a CSV file.
pub fn load_reference(path: &Path, schema: &AttributeSchema) -> Result<ReferenceTable, ArtifactError> {
    let file = File::open(path).map_err(|e| ArtifactError::io(path, e))?;
    let table = read_reference(BufReader::new(file), schema, path)?;
    info!(
        path = %path.display(),
        rows = table.row_count(),
        columns = table.columns().len(),
        "Loaded reference dataset"
    );
    Ok(table)
}

/// Read reference rows from any CSV source. `source` names it in errors.
pub fn read_reference<R: Read>(
    reader: R,
    schema: &AttributeSchema,
    source: &Path,
) -> Result<ReferenceTable, ArtifactError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| ArtifactError::csv(source, e.to_string()))?
        .clone();
    let positions = schema
        .attributes
        .iter()
        .map(|attr| {
            headers
                .iter()
                .position(|h| h == attr.name)
                .ok_or_else(|| ArtifactError::csv(source, format!("missing column '{}'", attr.name)))
        })
        .collect::<Result<Vec<usize>, _>>()?;

    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); schema.len()];
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| ArtifactError::csv(source, e.to_string()))?;
        for ((attr, &pos), column) in schema.attributes.iter().zip(&positions).zip(&mut columns) {
            let cell = record.get(pos).unwrap_or("");
            let value = parse_cell(attr, cell).ok_or_else(|| {
                ArtifactError::csv(
                    source,
                    format!("row {}: invalid value '{cell}' for '{}'", row + 1, attr.name),
                )
            })?;
            column.push(value);
        }
    }

    Ok(ReferenceTable::new(
        schema
            .feature_kinds()
            .into_iter()
            .zip(columns)
            .map(|((name, kind), values)| ReferenceColumn::new(name, kind, values))
            .collect(),
    ))
}

/// `Some(None)` for a missing cell, `None` for a value that cannot be encoded.
///
/// Numeric cells in flag and category columns must be codes the encoder can
/// produce: 0/1 for flags, `0..classes.len()` for categories.
fn parse_cell(attr: &AttributeSpec, cell: &str) -> Option<Option<f64>> {
    if cell.is_empty() {
        return Some(None);
    }
    let number = cell.parse::<f64>().ok();
    let code = match (&attr.kind, number) {
        (AttributeKind::Numeric, Some(v)) => v,
        (AttributeKind::Numeric, None) => return None,
        (AttributeKind::Flag, Some(v)) if v == 0.0 || v == 1.0 => v,
        (AttributeKind::Flag, Some(_)) => return None,
        (AttributeKind::Flag, None) => match cell.to_ascii_lowercase().as_str() {
            "true" | "yes" => 1.0,
            "false" | "no" => 0.0,
            _ => return None,
        },
        (AttributeKind::Category { classes }, Some(v)) => {
            if v.fract() != 0.0 || v < 0.0 || v >= classes.len() as f64 {
                return None;
            }
            v
        }
        (AttributeKind::Category { classes }, None) => {
            classes.iter().position(|c| c == cell)? as f64
        }
    };
    Some(Some(code))
}
