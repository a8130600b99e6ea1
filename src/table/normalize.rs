// src/table/normalize.rs

use arrow::{
    array::{ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tracing::{debug, info, instrument};

use super::columns::{self, KEY_CANDIDATES, PERIOD_COLUMNS};
use super::convert::{build_column, clean_str, infer_column_type, period_cmp};
use super::{IndicatorTable, RawTable, KEY_COLUMN};
use crate::error::Result;

/// Reduce `raw` to one row per country keyed by `Code`.
///
/// Returns `Ok(None)` when no header looks like a country key at all.
/// Rows with an empty key are aggregates ("World", regions) and are
/// dropped. With a period column, the row with the greatest period wins
/// per code and the first such row wins a tie; without one, the first
/// row per code wins. Only `Code` and metric columns are kept.
#[instrument(level = "debug", skip(raw), fields(table = %raw.name))]
pub fn normalize(raw: &RawTable) -> Result<Option<IndicatorTable>> {
    let Some(key_idx) = columns::find_column(&raw.headers, KEY_CANDIDATES) else {
        debug!(headers = ?raw.headers, "no key column");
        return Ok(None);
    };
    let period_idx =
        columns::find_exact(&raw.headers, PERIOD_COLUMNS).filter(|&i| i != key_idx);

    // seeding with `Code` drops a literal `Code` that lost to another key
    let mut seen_names: HashSet<&str> = HashSet::from([KEY_COLUMN]);
    let value_idx: Vec<usize> = (0..raw.headers.len())
        .filter(|&i| {
            let header = raw.headers[i].as_str();
            i != key_idx
                && Some(i) != period_idx
                && !header.is_empty()
                && !columns::is_period(header)
                && !columns::is_structural(header)
                && seen_names.insert(header)
        })
        .collect();

    // chosen source row per code, in first-seen order
    let mut chosen: Vec<usize> = Vec::new();
    let mut slot: HashMap<String, usize> = HashMap::new();
    let mut aggregates = 0usize;
    for row in 0..raw.rows.len() {
        let code = clean_str(raw.cell(row, key_idx));
        if code.is_empty() {
            aggregates += 1;
            continue;
        }
        match slot.get(&code) {
            None => {
                slot.insert(code, chosen.len());
                chosen.push(row);
            }
            Some(&pos) => {
                if let Some(p) = period_idx {
                    let current = clean_str(raw.cell(chosen[pos], p));
                    let candidate = clean_str(raw.cell(row, p));
                    if period_cmp(&candidate, &current) == Ordering::Greater {
                        chosen[pos] = row;
                    }
                }
            }
        }
    }

    let codes: StringArray = chosen
        .iter()
        .map(|&r| Some(clean_str(raw.cell(r, key_idx))))
        .collect();
    let mut fields = vec![Field::new(KEY_COLUMN, DataType::Utf8, false)];
    let mut arrays: Vec<ArrayRef> = vec![Arc::new(codes)];

    for &idx in &value_idx {
        let cells: Vec<String> = chosen
            .iter()
            .map(|&r| clean_str(raw.cell(r, idx)))
            .collect();
        let ty = infer_column_type(cells.iter().map(String::as_str));
        arrays.push(build_column(&cells, &ty));
        fields.push(Field::new(raw.headers[idx].as_str(), ty, true));
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    info!(
        key = %raw.headers[key_idx],
        period = ?period_idx.map(|p| raw.headers[p].as_str()),
        rows_in = raw.rows.len(),
        rows_out = batch.num_rows(),
        aggregates,
        metrics = value_idx.len(),
        "normalized"
    );
    IndicatorTable::new(raw.name.clone(), batch).map(Some)
}
