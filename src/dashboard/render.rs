//! `RecordBatch` to HTML tables

use std::fmt::Write as _;

use arrow::array::{Array, Float64Array, RecordBatch};
use arrow::datatypes::DataType;
use arrow::util::display::array_value_to_string;

use crate::Result;

/// Render a batch as an HTML `<table>`.
///
/// Floats are printed with four decimals and nulls as empty cells. When
/// `link_column` names a column, each of its cells links to `/experiments/<value>`.
///
/// # Errors
///
/// Returns error if a cell cannot be formatted.
pub fn table(batch: &RecordBatch, link_column: Option<&str>) -> Result<String> {
    let schema = batch.schema();
    let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n  <thead>\n    <tr>");
    for field in schema.fields() {
        let _ = write!(html, "<th>{}</th>", escape(field.name()));
    }
    html.push_str("</tr>\n  </thead>\n  <tbody>\n");

    for row in 0..batch.num_rows() {
        html.push_str("    <tr>");
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            let text = cell(column.as_ref(), row)?;
            if link_column == Some(field.name().as_str()) && !text.is_empty() {
                let text = escape(&text);
                let _ = write!(html, "<td><a href=\"/experiments/{text}\">{text}</a></td>");
            } else {
                let _ = write!(html, "<td>{}</td>", escape(&text));
            }
        }
        html.push_str("</tr>\n");
    }

    html.push_str("  </tbody>\n</table>");
    Ok(html)
}

/// A titled section: `<h1>` followed by the table.
///
/// # Errors
///
/// Returns error if a cell cannot be formatted.
pub fn section(title: &str, batch: &RecordBatch, link_column: Option<&str>) -> Result<String> {
    Ok(format!("<h1>{}</h1>\n{}", escape(title), table(batch, link_column)?))
}

fn cell(column: &dyn Array, row: usize) -> Result<String> {
    if column.is_null(row) {
        return Ok(String::new());
    }
    if column.data_type() == &DataType::Float64 {
        if let Some(floats) = column.as_any().downcast_ref::<Float64Array>() {
            return Ok(format!("{:.4}", floats.value(row)));
        }
    }
    Ok(array_value_to_string(column, row)?)
}

/// Escape text for an HTML element body or a double-quoted attribute.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            ("ID", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
            (
                "Name",
                Arc::new(StringArray::from(vec![Some("<b>x</b>"), None])) as ArrayRef,
            ),
            ("Loss", Arc::new(Float64Array::from(vec![0.123_456, 1.0])) as ArrayRef),
        ])
        .unwrap()
    }

    #[test]
    fn test_table_formats_and_escapes() {
        let html = table(&batch(), None).unwrap();
        assert!(html.contains("<th>ID</th><th>Name</th><th>Loss</th>"));
        assert!(html.contains("<td>&lt;b&gt;x&lt;/b&gt;</td>"));
        assert!(html.contains("<td>0.1235</td>"));
        assert!(html.contains("<td>1.0000</td>"));
        assert!(html.contains("<td></td>"));
    }

    #[test]
    fn test_link_column() {
        let html = table(&batch(), Some("ID")).unwrap();
        assert!(html.contains("<td><a href=\"/experiments/2\">2</a></td>"));
    }

    #[test]
    fn test_section_title() {
        let html = section("Training Metrics", &batch(), None).unwrap();
        assert!(html.starts_with("<h1>Training Metrics</h1>\n<table"));
    }
}
