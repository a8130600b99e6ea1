use arrow::{
    array::{ArrayRef, Float64Array, Int64Array, StringArray},
    datatypes::DataType,
};
use std::sync::Arc;

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// Narrowest type that holds every non-empty cell without loss.
/// Integers → Int64, other numbers → Float64, anything else → Utf8.
pub fn infer_column_type<'a, I>(cells: I) -> DataType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = false;
    let mut all_int = true;
    for cell in cells.into_iter().filter(|c| !c.is_empty()) {
        seen = true;
        if all_int && cell.parse::<i64>().is_ok() {
            continue;
        }
        all_int = false;
        if cell.parse::<f64>().is_err() {
            return DataType::Utf8;
        }
    }
    match (seen, all_int) {
        (false, _) => DataType::Utf8,
        (true, true) => DataType::Int64,
        (true, false) => DataType::Float64,
    }
}

fn present(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Build an arrow column of `ty` from cleaned cells; empty cells are null.
pub fn build_column(cells: &[String], ty: &DataType) -> ArrayRef {
    match ty {
        DataType::Int64 => Arc::new(
            cells
                .iter()
                .map(|s| present(s).and_then(|v| v.parse::<i64>().ok()))
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            cells
                .iter()
                .map(|s| present(s).and_then(|v| v.parse::<f64>().ok()))
                .collect::<Float64Array>(),
        ),
        _ => Arc::new(cells.iter().map(|s| present(s)).collect::<StringArray>()),
    }
}

/// Order two period values. Numbers compare numerically, a present value
/// beats an empty one, otherwise plain string order.
pub fn period_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use std::cmp::Ordering;

    #[test]
    fn clean_str_strips_quotes_and_whitespace() {
        assert_eq!(clean_str("  \"USA\" "), "USA");
        assert_eq!(clean_str("\""), "\"");
        assert_eq!(clean_str(" 12.5\t"), "12.5");
    }

    #[test]
    fn infers_narrowest_lossless_type() {
        assert_eq!(infer_column_type(["1", "", "-3"]), DataType::Int64);
        assert_eq!(infer_column_type(["1", "2.5"]), DataType::Float64);
        assert_eq!(infer_column_type(["1e3", "4"]), DataType::Float64);
        assert_eq!(infer_column_type(["1", "n/a"]), DataType::Utf8);
        assert_eq!(infer_column_type(["", ""]), DataType::Utf8);
    }

    #[test]
    fn build_column_maps_empty_to_null() {
        let cells = vec!["100".to_string(), "".to_string(), "-2".to_string()];
        let col = build_column(&cells, &DataType::Int64);
        let ints = col.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(ints.value(0), 100);
        assert!(ints.is_null(1));
        assert_eq!(ints.value(2), -2);
    }

    #[test]
    fn periods_compare_numerically() {
        assert_eq!(period_cmp("2021", "2019"), Ordering::Greater);
        assert_eq!(period_cmp("999", "2019"), Ordering::Less);
        assert_eq!(period_cmp("", "1900"), Ordering::Less);
        assert_eq!(period_cmp("2020", "2020.0"), Ordering::Equal);
        assert_eq!(period_cmp("2020-Q2", "2020-Q1"), Ordering::Greater);
    }
}
