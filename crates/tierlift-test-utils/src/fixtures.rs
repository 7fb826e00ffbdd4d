//! Workbook and webhook body fixtures.

use rust_xlsxwriter::Workbook;
use serde_json::{json, Value};

/// Event type of a subscription validation request.
pub const VALIDATION_EVENT_TYPE: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";

/// Event type of a blob creation notification.
pub const BLOB_CREATED_EVENT_TYPE: &str = "Microsoft.Storage.BlobCreated";

/// Builds an `.xlsx` document with one sheet named `Sheet1` holding `rows` as strings.
pub fn workbook_bytes(rows: &[&[&str]]) -> Vec<u8> {
    workbook_with_sheets(&[("Sheet1", rows)])
}

/// Builds an `.xlsx` document with several named sheets of string cells.
pub fn workbook_with_sheets(sheets: &[(&str, &[&[&str]])]) -> Vec<u8> {
    let mut book = Workbook::new();
    for (name, rows) in sheets {
        let sheet = book.add_worksheet();
        sheet.set_name(*name).expect("sheet name");
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                if text.is_empty() {
                    continue;
                }
                let r = u32::try_from(r).expect("row");
                let c = u16::try_from(c).expect("column");
                sheet.write_string(r, c, *text).expect("write cell");
            }
        }
    }
    book.save_to_buffer().expect("serialize workbook")
}

/// A subscription validation batch carrying `code`.
pub fn validation_body(code: &str) -> Value {
    json!([{
        "id": "1",
        "eventType": VALIDATION_EVENT_TYPE,
        "subject": "",
        "eventTime": "2025-01-01T00:00:00Z",
        "data": { "validationCode": code },
        "dataVersion": "1",
    }])
}

/// A single event of the given type for `url`.
pub fn event(id: &str, event_type: &str, url: &str) -> Value {
    json!({
        "id": id,
        "eventType": event_type,
        "subject": format!("/blobServices/default/containers/{url}"),
        "eventTime": "2025-01-01T00:00:00Z",
        "data": {
            "api": "PutBlob",
            "contentType": "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "blobType": "BlockBlob",
            "url": url,
        },
        "dataVersion": "1",
    })
}

/// A batch with one blob-created event per URL.
pub fn blob_created_body(urls: &[&str]) -> Value {
    Value::Array(
        urls.iter()
            .enumerate()
            .map(|(i, url)| event(&(i + 1).to_string(), BLOB_CREATED_EVENT_TYPE, url))
            .collect(),
    )
}
