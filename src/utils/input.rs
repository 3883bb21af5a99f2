use crate::utils::error::{DiscoveryError, Result};
use std::io::Read;
use std::path::Path;

/// 從 CSV 讀取識別碼；未指定欄位時使用第一欄，空白儲存格略過
pub fn read_identifiers_csv<P: AsRef<Path>>(path: P, column: Option<&str>) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    read_identifiers(file, column)
}

pub fn read_identifiers<R: Read>(reader: R, column: Option<&str>) -> Result<Vec<String>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let column_index = match column {
        Some(name) => {
            let headers = csv_reader.headers()?;
            headers
                .iter()
                .position(|header| header.eq_ignore_ascii_case(name))
                .ok_or_else(|| DiscoveryError::InvalidConfigValueError {
                    field: "column".to_string(),
                    value: name.to_string(),
                    reason: format!(
                        "Column not found. Available columns: {}",
                        headers.iter().collect::<Vec<_>>().join(", ")
                    ),
                })?
        }
        None => 0,
    };

    let mut identifiers = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if let Some(value) = record.get(column_index) {
            if !value.is_empty() {
                identifiers.push(value.to_string());
            }
        }
    }

    tracing::debug!("Read {} identifiers from CSV input", identifiers.len());
    Ok(identifiers)
}

/// `--identifiers` 參數的逗號分隔清單
pub fn split_identifier_list(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|chunk| chunk.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}
