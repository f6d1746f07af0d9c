//! CSV reports of batch results.

use super::broll::BrollResult;
use super::item::{BatchItem, ProcessingResult};
use crate::error_code::ErrorCategory;
use crate::types::GenerationStatus;
use crate::{Error, Result};
use serde::Deserialize;
use std::io;

/// URLs of one cell are joined with this.
pub const URL_SEPARATOR: &str = ";";

/// `id,prompt,status,urls,error`, one row per result.
pub fn results_csv(results: &[ProcessingResult]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(&mut writer, ["id", "prompt", "status", "urls", "error"])?;
    for r in results {
        write_row(
            &mut writer,
            [
                r.id.as_str(),
                r.prompt.as_str(),
                status_str(r.status),
                r.urls.join(URL_SEPARATOR).as_str(),
                r.error.as_deref().unwrap_or(""),
            ],
        )?;
    }
    finish(writer)
}

/// Failed items as a new batch input (`id,prompt,count`).
///
/// With `retryable_only`, failures classified as permanent are left out;
/// unclassified ones stay in.
pub fn failed_csv(results: &[ProcessingResult], retryable_only: bool) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(&mut writer, ["id", "prompt", "count"])?;
    let failed = results.iter().filter(|r| !r.is_completed()).filter(|r| {
        !(retryable_only && r.error_category == Some(ErrorCategory::Permanent))
    });
    for r in failed {
        write_row(&mut writer, [r.id.as_str(), r.prompt.as_str(), "1"])?;
    }
    finish(writer)
}

/// Both steps of a B-roll run side by side.
pub fn broll_csv(results: &[BrollResult]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    write_row(
        &mut writer,
        [
            "id",
            "prompt",
            "image_status",
            "image_urls",
            "image_error",
            "video_status",
            "video_urls",
            "video_error",
        ],
    )?;
    for r in results {
        let video_urls = r
            .video
            .as_ref()
            .map(|v| v.urls.join(URL_SEPARATOR))
            .unwrap_or_default();
        write_row(
            &mut writer,
            [
                r.id.as_str(),
                r.prompt.as_str(),
                status_str(r.image.status),
                r.image.urls.join(URL_SEPARATOR).as_str(),
                r.image.error.as_deref().unwrap_or(""),
                r.video.as_ref().map_or("", |v| status_str(v.status)),
                video_urls.as_str(),
                r.video.as_ref().and_then(|v| v.error.as_deref()).unwrap_or(""),
            ],
        )?;
    }
    finish(writer)
}

#[derive(Deserialize)]
struct ItemRow {
    #[serde(default)]
    id: Option<String>,
    prompt: String,
    #[serde(default)]
    count: Option<u8>,
}

/// Batch items from a CSV with a `prompt` column and optional `id` and
/// `count` columns, as written by [`failed_csv`].
pub fn items_from_csv(text: &str) -> Result<Vec<BatchItem>> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let mut items = Vec::new();
    for (i, row) in reader.deserialize::<ItemRow>().enumerate() {
        let row = row.map_err(|e| Error::validation(format!("CSV row {}: {}", i + 1, e)))?;
        let id = row
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("item_{:03}", i + 1));
        items.push(BatchItem::new(id, row.prompt).with_count(row.count.unwrap_or(1)));
    }
    Ok(items)
}

fn status_str(status: GenerationStatus) -> &'static str {
    match status {
        GenerationStatus::Processing => "processing",
        GenerationStatus::Completed => "completed",
        GenerationStatus::Failed => "failed",
    }
}

fn write_row<'a>(
    writer: &mut csv::Writer<Vec<u8>>,
    row: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    writer.write_record(row).map_err(io::Error::from)?;
    Ok(())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> BatchItem {
        BatchItem::new(id, format!("prompt for {}", id))
    }

    #[test]
    fn results_rows_quote_commas_and_join_urls() {
        let a = BatchItem::new("a", "fog, then rain");
        let results = vec![
            ProcessingResult::completed(&a, vec!["https://x/1.png".into(), "https://x/2.png".into()]),
            ProcessingResult::failed(&item("b"), "blocked", Some(ErrorCategory::Permanent)),
        ];
        let csv = results_csv(&results).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,prompt,status,urls,error");
        assert_eq!(lines[1], "a,\"fog, then rain\",completed,https://x/1.png;https://x/2.png,");
        assert_eq!(lines[2], "b,prompt for b,failed,,blocked");
    }

    #[test]
    fn failed_rows_can_skip_permanent_errors() {
        let results = vec![
            ProcessingResult::completed(&item("a"), vec!["u".into()]),
            ProcessingResult::failed(&item("b"), "blocked", Some(ErrorCategory::Permanent)),
            ProcessingResult::failed(&item("c"), "timeout", Some(ErrorCategory::Retryable)),
            ProcessingResult::failed(&item("d"), "odd", None),
        ];
        let all = failed_csv(&results, false).unwrap();
        assert_eq!(all.lines().count(), 4);

        let retryable = failed_csv(&results, true).unwrap();
        let ids: Vec<&str> = retryable
            .lines()
            .skip(1)
            .filter_map(|l| l.split(',').next())
            .collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[test]
    fn failed_csv_reads_back_as_items() {
        let results = vec![ProcessingResult::failed(
            &BatchItem::new("item_004", "dunes, wind and \"sand\""),
            "timeout",
            Some(ErrorCategory::Retryable),
        )];
        let items = items_from_csv(&failed_csv(&results, true).unwrap()).unwrap();
        assert_eq!(items, vec![BatchItem::new("item_004", "dunes, wind and \"sand\"")]);
    }

    #[test]
    fn items_without_ids_are_numbered() {
        let items = items_from_csv("prompt\nfirst prompt here\nsecond prompt here\n").unwrap();
        assert_eq!(items[1].id, "item_002");
        assert_eq!(items[1].count, 1);
        assert!(items_from_csv("id,count\na,2\n").is_err());
    }

    #[test]
    fn broll_rows_leave_missing_video_blank() {
        let a = item("a");
        let results = vec![BrollResult {
            id: "a".into(),
            prompt: a.prompt.clone(),
            image: ProcessingResult::failed(&a, "timeout", Some(ErrorCategory::Retryable)),
            video: None,
        }];
        let csv = broll_csv(&results).unwrap();
        assert_eq!(csv.lines().nth(1), Some("a,prompt for a,failed,,timeout,,,"));
    }
}
