//! Gold annotation loading
//!
//! Gold data arrives either as ready-made [`AspectAnnotation`]s or as a flat
//! table with one row per gold aspect. Tables are read from spreadsheets
//! (XLSX, XLS, ODS via calamine) or from JSON arrays of flat records, and are
//! grouped into one annotation per document.

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use senta_core::{AspectAnnotation, Result, SentaError, SentimentAnnotation};
use serde_json::Value;
use tracing::debug;

// ============================================================================
// Gold Data
// ============================================================================

/// Gold annotations accepted by [`crate::AspectAnnotator::test_annotator`]
#[derive(Debug, Clone)]
pub enum GoldData {
    Annotations(Vec<AspectAnnotation>),
    Table { table: GoldTable, columns: GoldColumns },
}

impl GoldData {
    pub fn table(table: GoldTable, columns: GoldColumns) -> Self {
        Self::Table { table, columns }
    }

    /// Resolve into one annotation per document
    pub fn into_annotations(self) -> Result<Vec<AspectAnnotation>> {
        match self {
            Self::Annotations(annotations) => Ok(annotations),
            Self::Table { table, columns } => table.into_annotations(&columns),
        }
    }
}

impl From<Vec<AspectAnnotation>> for GoldData {
    fn from(annotations: Vec<AspectAnnotation>) -> Self {
        Self::Annotations(annotations)
    }
}

// ============================================================================
// Column Mapping
// ============================================================================

/// Names of the four columns a gold table must provide
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoldColumns {
    pub id: Option<String>,
    pub text: Option<String>,
    pub aspect: Option<String>,
    pub sentiment: Option<String>,
}

impl GoldColumns {
    pub fn new() -> Self {
        Self::default()
    }

    /// All four columns at once
    pub fn named(
        id: impl Into<String>,
        text: impl Into<String>,
        aspect: impl Into<String>,
        sentiment: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            text: Some(text.into()),
            aspect: Some(aspect.into()),
            sentiment: Some(sentiment.into()),
        }
    }

    pub fn with_id(mut self, column: impl Into<String>) -> Self {
        self.id = Some(column.into());
        self
    }

    pub fn with_text(mut self, column: impl Into<String>) -> Self {
        self.text = Some(column.into());
        self
    }

    pub fn with_aspect(mut self, column: impl Into<String>) -> Self {
        self.aspect = Some(column.into());
        self
    }

    pub fn with_sentiment(mut self, column: impl Into<String>) -> Self {
        self.sentiment = Some(column.into());
        self
    }

    /// Column names in id, text, aspect, sentiment order
    fn require(&self) -> Result<[&str; 4]> {
        fn get<'a>(column: &'a Option<String>, role: &str) -> Result<&'a str> {
            column.as_deref().ok_or_else(|| SentaError::MissingColumn {
                column: format!("{role}_column"),
            })
        }

        Ok([
            get(&self.id, "id")?,
            get(&self.text, "text")?,
            get(&self.aspect, "aspect")?,
            get(&self.sentiment, "sentiment")?,
        ])
    }
}

// ============================================================================
// Gold Table
// ============================================================================

/// A table of string cells with a header row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoldTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl GoldTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Load by file extension: spreadsheets through calamine, `.json` as
    /// records
    pub fn from_path(path: impl AsRef<Path>, sheet: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Self::from_excel(path, sheet),
            "json" => Self::from_json_records(&std::fs::read_to_string(path)?),
            other => Err(SentaError::TableError(format!(
                "unsupported gold file type `{other}`: {}",
                path.display()
            ))),
        }
    }

    /// Read a worksheet; the first row is the header
    ///
    /// Uses the named sheet, or the first sheet of the workbook.
    pub fn from_excel(path: impl AsRef<Path>, sheet: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let mut workbook =
            open_workbook_auto(path).map_err(|e| SentaError::TableError(e.to_string()))?;

        let sheet_name = match sheet {
            Some(name) => name.to_string(),
            None => workbook.sheet_names().first().cloned().ok_or_else(|| {
                SentaError::TableError(format!("workbook has no sheets: {}", path.display()))
            })?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| SentaError::TableError(format!("sheet `{sheet_name}`: {e}")))?;

        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|row| row.iter().map(cell_to_string).collect())
            .unwrap_or_default();

        let rows: Vec<Vec<String>> = rows
            .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
            .filter(|row: &Vec<String>| !row.iter().all(|s| s.is_empty()))
            .collect();

        debug!(sheet = %sheet_name, rows = rows.len(), "loaded gold worksheet");
        Ok(Self { headers, rows })
    }

    /// Parse a JSON array of flat objects
    ///
    /// Headers are the union of the record keys. A key missing from a record
    /// reads as an empty cell.
    pub fn from_json_records(json: &str) -> Result<Self> {
        let records: Vec<serde_json::Map<String, Value>> = serde_json::from_str(json)
            .map_err(|e| SentaError::TableError(format!("expected an array of records: {e}")))?;

        let mut headers: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| record.get(h).map(value_to_string).unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(Self { headers, rows })
    }

    /// Position of a header
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| SentaError::MissingColumn {
                column: column.to_string(),
            })
    }

    /// All cells of one column
    pub fn column_values(&self, column: &str) -> Result<Vec<String>> {
        let index = self.column_index(column)?;
        Ok(self.rows.iter().map(|row| cell(row, index)).collect())
    }

    /// Group rows into one annotation per document
    ///
    /// Documents are keyed by (id, text) and kept in order of first
    /// appearance; aspects keep row order. A row with an empty aspect cell
    /// registers its document without adding an aspect.
    pub fn into_annotations(&self, columns: &GoldColumns) -> Result<Vec<AspectAnnotation>> {
        let [id, text, aspect, sentiment] = columns.require()?;
        let id = self.column_index(id)?;
        let text = self.column_index(text)?;
        let aspect = self.column_index(aspect)?;
        let sentiment = self.column_index(sentiment)?;

        let mut documents: Vec<AspectAnnotation> = Vec::new();
        let mut positions: HashMap<(String, String), usize> = HashMap::new();

        for row in &self.rows {
            let key = (cell(row, id), cell(row, text));
            let position = *positions.entry(key).or_insert_with_key(|(_, text)| {
                documents.push(AspectAnnotation::empty(text.as_str()));
                documents.len() - 1
            });

            let aspect_text = cell(row, aspect);
            if !aspect_text.trim().is_empty() {
                documents[position]
                    .aspects
                    .push(SentimentAnnotation::new(aspect_text, cell(row, sentiment)));
            }
        }

        debug!(rows = self.rows.len(), documents = documents.len(), "grouped gold table");
        Ok(documents)
    }
}

/// Read a JSON file holding a list of [`AspectAnnotation`]s
pub fn read_annotations_json(path: impl AsRef<Path>) -> Result<Vec<AspectAnnotation>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    serde_json::from_str(&content)
        .map_err(|e| SentaError::TableError(format!("invalid annotation file: {e}")))
}

fn cell(row: &[String], index: usize) -> String {
    row.get(index).cloned().unwrap_or_default()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            // Integer ids come back from spreadsheets as floats
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                format!("{f}")
            }
        }
        Data::Int(i) => format!("{i}"),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERROR: {e:?}"),
        Data::DateTime(dt) => format!("{dt}"),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn review_table() -> GoldTable {
        let headers = ["id", "review", "aspect", "sentiment"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = vec![
            vec!["1", "Pizza great, staff rude", "Pizza", "positive"],
            vec!["2", "Nothing to say", "", ""],
            vec!["1", "Pizza great, staff rude", "staff", "negative"],
            vec!["3", "Cold soup", "soup", "Negative"],
        ]
        .into_iter()
        .map(|row| row.into_iter().map(str::to_string).collect())
        .collect();
        GoldTable::new(headers, rows)
    }

    fn review_columns() -> GoldColumns {
        GoldColumns::named("id", "review", "aspect", "sentiment")
    }

    #[test]
    fn test_groups_rows_by_document() {
        let annotations = review_table().into_annotations(&review_columns()).unwrap();

        assert_eq!(annotations.len(), 3);
        assert_eq!(annotations[0].text, "Pizza great, staff rude");
        let aspects: Vec<&str> = annotations[0].aspects.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(aspects, vec!["Pizza", "staff"]);
        assert!(annotations[1].aspects.is_empty());
        assert_eq!(annotations[2].aspects[0].label, "Negative");
    }

    #[test]
    fn test_unset_column_is_named_by_role() {
        let columns = GoldColumns::new()
            .with_id("id")
            .with_text("review")
            .with_aspect("aspect");

        let err = review_table().into_annotations(&columns).unwrap_err();
        match err {
            SentaError::MissingColumn { column } => assert_eq!(column, "sentiment_column"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_absent_header_is_named() {
        let columns = GoldColumns::named("id", "text", "aspect", "sentiment");
        let err = review_table().into_annotations(&columns).unwrap_err();
        assert!(err.to_string().contains("text"));
        assert!(matches!(err, SentaError::MissingColumn { .. }));
    }

    #[test]
    fn test_gold_data_from_table() {
        let gold = GoldData::table(review_table(), review_columns());
        assert_eq!(gold.into_annotations().unwrap().len(), 3);
    }

    #[test]
    fn test_json_records() {
        let json = r#"[
            {"id": 7, "text": "Good coffee", "aspect": "coffee", "sentiment": "positive"},
            {"id": 8, "text": "Meh", "aspect": null}
        ]"#;
        let table = GoldTable::from_json_records(json).unwrap();

        assert_eq!(table.headers.len(), 4);
        assert_eq!(table.column_values("id").unwrap(), vec!["7", "8"]);
        assert_eq!(table.column_values("sentiment").unwrap(), vec!["positive", ""]);

        let annotations = table
            .into_annotations(&GoldColumns::named("id", "text", "aspect", "sentiment"))
            .unwrap();
        assert_eq!(annotations.len(), 2);
        assert!(annotations[1].aspects.is_empty());
    }

    #[test]
    fn test_json_records_rejects_non_array() {
        let err = GoldTable::from_json_records(r#"{"id": 1}"#).unwrap_err();
        assert!(matches!(err, SentaError::TableError(_)));
    }

    #[test]
    fn test_from_path_dispatches_on_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"id": "a", "text": "t", "aspect": "x", "sentiment": "neutral"}}]"#)
            .unwrap();

        let table = GoldTable::from_path(file.path(), None).unwrap();
        assert_eq!(table.rows.len(), 1);

        let err = GoldTable::from_path("gold.txt", None).unwrap_err();
        assert!(err.to_string().contains("unsupported gold file type"));
    }

    #[test]
    fn test_read_annotations_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"text": "Food ok", "aspects": [{{"text": "Food", "label": "neutral"}}]}}]"#
        )
        .unwrap();

        let annotations = read_annotations_json(file.path()).unwrap();
        assert_eq!(annotations[0].aspects[0].label, "neutral");
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::Float(10.0)), "10");
        assert_eq!(cell_to_string(&Data::Float(3.5)), "3.5");
        assert_eq!(cell_to_string(&Data::Int(42)), "42");
    }
}
