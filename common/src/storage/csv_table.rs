use std::collections::HashMap;

use crate::error::AppError;

/// One data row of a CSV file, keyed by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    values: HashMap<String, String>,
}

impl CsvRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// First value among `columns` that is not blank, in the given order.
    ///
    /// Whitespace-only cells count as blank. The value is returned untrimmed.
    pub fn first_non_empty(&self, columns: &[&str]) -> Option<&str> {
        columns
            .iter()
            .filter_map(|column| self.get(column))
            .find(|value| !value.trim().is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CsvRow {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Parses CSV text with a header row. Short rows leave trailing columns absent.
pub fn parse_csv(text: &str) -> Result<Vec<CsvRow>, AppError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(headers.iter().zip(record.iter()).collect());
    }

    Ok(rows)
}

/// Serializes a header and rows into CSV bytes. The header is written even without rows.
pub fn encode_csv<R, F>(header: &[&str], rows: R) -> Result<Vec<u8>, AppError>
where
    R: IntoIterator<Item = F>,
    F: IntoIterator,
    F::Item: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Storage(format!("failed to flush CSV buffer: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_by_header() {
        let rows = parse_csv("question_id,question_text\n1,What is CCPA?\n2,\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("question_id"), Some("1"));
        assert_eq!(rows[0].get("question_text"), Some("What is CCPA?"));
        assert_eq!(rows[1].get("question_text"), Some(""));
    }

    #[test]
    fn strips_bom_and_tolerates_short_rows() {
        let rows = parse_csv("\u{feff}id, question\n7\n8,Retention period?\n").unwrap();
        assert_eq!(rows[0].get("id"), Some("7"));
        assert_eq!(rows[0].get("question"), None);
        assert_eq!(rows[1].get("question"), Some("Retention period?"));
    }

    #[test]
    fn quoted_fields_keep_commas_and_newlines() {
        let rows =
            parse_csv("id,question\n1,\"Do you encrypt data, at rest?\nExplain.\"\n").unwrap();
        assert_eq!(
            rows[0].get("question"),
            Some("Do you encrypt data, at rest?\nExplain.")
        );
    }

    #[test]
    fn first_non_empty_respects_column_order() {
        let row: CsvRow = [("question_id", ""), ("id", "42")].into_iter().collect();
        assert_eq!(row.first_non_empty(&["question_id", "id"]), Some("42"));
        assert_eq!(row.first_non_empty(&["missing"]), None);
    }

    #[test]
    fn first_non_empty_skips_whitespace_only_cells() {
        let row: CsvRow = [("question_text", "   "), ("question", " Do you sell data?")]
            .into_iter()
            .collect();
        assert_eq!(
            row.first_non_empty(&["question_text", "question"]),
            Some(" Do you sell data?")
        );
        assert_eq!(row.first_non_empty(&["question_text"]), None);
    }

    #[test]
    fn encode_writes_header_without_rows() {
        let bytes = encode_csv(&["question_id", "answer", "citations"], Vec::<Vec<String>>::new())
            .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "question_id,answer,citations\n");
    }

    #[test]
    fn encode_quotes_embedded_json() {
        let bytes = encode_csv(
            &["question_id", "answer", "citations"],
            vec![vec![
                "1".to_string(),
                "Yes, we do.".to_string(),
                r#"[{"title":"Policy","page":3}]"#.to_string(),
            ]],
        )
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "question_id,answer,citations\n1,\"Yes, we do.\",\"[{\"\"title\"\":\"\"Policy\"\",\"\"page\"\":3}]\"\n"
        );

        let parsed = parse_csv(&text).unwrap();
        assert_eq!(parsed[0].get("citations"), Some(r#"[{"title":"Policy","page":3}]"#));
    }
}
