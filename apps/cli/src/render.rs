use catalog_core::catalog::CatalogRecord;
use catalog_core::sync::SyncResult;

use crate::args::OutputFormat;

const MAX_LISTED_KEYS: usize = 10;

/// One output line for one emission.
pub fn line<R: CatalogRecord>(result: &SyncResult<R>, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string(result),
        OutputFormat::Text => Ok(text(result)),
    }
}

fn text<R: CatalogRecord>(result: &SyncResult<R>) -> String {
    match result {
        SyncResult::Loading => "loading".to_string(),
        SyncResult::Success(records) => {
            let mut keys = records
                .iter()
                .take(MAX_LISTED_KEYS)
                .map(|record| record.natural_key())
                .collect::<Vec<_>>()
                .join(", ");
            if records.len() > MAX_LISTED_KEYS {
                keys.push_str(", ...");
            }
            format!("success: {} {} record(s) [{}]", records.len(), R::KIND, keys)
        }
        SyncResult::Error(err) => format!("error[{}]: {}", err.kind, err.message),
    }
}
