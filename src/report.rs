//! Reading story lists and writing audit/outcome reports.
//!
//! Input CSVs come from the audit or from hand-edited spreadsheets, so
//! headers are matched loosely and the site may come from the file name.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::state_machine::{ContentItem, LifecycleState, OutcomeRecord, RunSummary};

const ID_HEADERS: &[&str] = &["story_id", "arc_id", "id", "_id"];
const DATE_HEADERS: &[&str] = &["publish_date", "publish", "date"];
const URL_HEADERS: &[&str] = &["url", "canonical_url", "website_url"];
const SITE_HEADERS: &[&str] = &["site", "website", "website_name"];
const STATE_HEADERS: &[&str] = &["state"];

const AUDIT_PREFIX: &str = "notas_publicadas_";

/// Video audit output, one file for every site.
pub const VIDEO_REPORT_FILE: &str = "todos_los_videos_para_eliminar.csv";

/// `{reports_dir}/{site}/notas_publicadas_{site}_{year}.csv`
pub fn audit_report_path(reports_dir: &Path, site: &str, year: i32) -> PathBuf {
    reports_dir
        .join(site)
        .join(format!("{AUDIT_PREFIX}{site}_{year}.csv"))
}

/// Site name encoded in an audit report file name, if any.
pub fn infer_site(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let rest = stem.strip_prefix(AUDIT_PREFIX)?;
    let (site, year) = rest.rsplit_once('_')?;
    if site.is_empty() || year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(site.to_string())
}

fn column(headers: &csv::StringRecord, aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.contains(&h.trim().to_ascii_lowercase().as_str()))
}

fn input_error(path: &Path, message: impl Into<String>) -> AppError {
    AppError::Input {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// Read one report CSV. Rows without an id are skipped.
pub fn read_csv(path: &Path) -> Result<Vec<ContentItem>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_col = column(&headers, ID_HEADERS)
        .ok_or_else(|| input_error(path, "missing story_id column"))?;
    let date_col = column(&headers, DATE_HEADERS);
    let url_col = column(&headers, URL_HEADERS);
    let site_col = column(&headers, SITE_HEADERS);
    let state_col = column(&headers, STATE_HEADERS);
    let file_site = infer_site(path);

    let field = |row: &csv::StringRecord, col: Option<usize>| {
        col.and_then(|c| row.get(c))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut items = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row?;
        let Some(id) = field(&row, Some(id_col)) else {
            debug!(file = %path.display(), line = line + 2, "row without id skipped");
            continue;
        };
        let state = match field(&row, state_col) {
            Some(raw) => raw.parse::<LifecycleState>().unwrap_or_else(|err| {
                warn!(file = %path.display(), story = %id, %err, "treating state as unknown");
                LifecycleState::Unknown
            }),
            None => LifecycleState::Unknown,
        };
        items.push(ContentItem {
            id,
            state,
            site: field(&row, site_col).or_else(|| file_site.clone()),
            publish_date: field(&row, date_col),
            url: field(&row, url_col),
        });
    }
    debug!(file = %path.display(), items = items.len(), "report read");
    Ok(items)
}

/// Every `*.csv` directly under `dir`, read in file-name order.
pub fn read_csv_dir(dir: &Path) -> Result<Vec<ContentItem>, AppError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();

    let mut items = Vec::new();
    for file in &files {
        items.extend(read_csv(file)?);
    }
    info!(dir = %dir.display(), files = files.len(), items = items.len(), "reports read");
    Ok(items)
}

/// One id per line; blank lines and `#` comments are ignored.
pub fn read_ids_file(path: &Path) -> Result<Vec<ContentItem>, AppError> {
    let reader = BufReader::new(File::open(path)?);
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let id = line.trim();
        if id.is_empty() || id.starts_with('#') {
            continue;
        }
        items.push(ContentItem::new(id));
    }
    Ok(items)
}

/// Drop repeated ids, keeping the first occurrence and the input order.
pub fn dedupe(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut seen = HashSet::new();
    let before = items.len();
    let unique: Vec<_> = items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect();
    if unique.len() < before {
        warn!(duplicates = before - unique.len(), "duplicate story ids dropped");
    }
    unique
}

#[derive(Serialize)]
struct AuditRow<'a> {
    story_id: &'a str,
    publish_date: &'a str,
    url: &'a str,
}

fn create(path: &Path) -> Result<BufWriter<File>, AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// Write an audit report: `story_id,publish_date,url`.
pub fn write_audit_csv(path: &Path, items: &[ContentItem]) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(create(path)?);
    writer.write_record(["story_id", "publish_date", "url"])?;
    for item in items {
        writer.serialize(AuditRow {
            story_id: &item.id,
            publish_date: item.publish_date.as_deref().unwrap_or_default(),
            url: item.url.as_deref().unwrap_or_default(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the audit report of `site`/`year` under `reports_dir`.
///
/// A year without stories leaves no file behind; returns the path written otherwise.
pub fn write_audit_report(
    reports_dir: &Path,
    site: &str,
    year: i32,
    items: &[ContentItem],
) -> Result<Option<PathBuf>, AppError> {
    if items.is_empty() {
        debug!(site, year, "no stories, report not written");
        return Ok(None);
    }
    let path = audit_report_path(reports_dir, site, year);
    write_audit_csv(&path, items)?;
    Ok(Some(path))
}

#[derive(Serialize)]
struct VideoRow<'a> {
    arc_id: &'a str,
    website_name: &'a str,
}

/// Write the video audit: `arc_id,website_name`.
pub fn write_video_csv(path: &Path, items: &[ContentItem]) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(create(path)?);
    writer.write_record(["arc_id", "website_name"])?;
    for item in items {
        writer.serialize(VideoRow {
            arc_id: &item.id,
            website_name: item.site.as_deref().unwrap_or_default(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per outcome record, in log order.
pub fn write_outcomes_csv(path: &Path, records: &[OutcomeRecord]) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(create(path)?);
    writer.write_record([
        "story_id",
        "step",
        "status",
        "error_kind",
        "detail",
        "timestamp",
    ])?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &RunSummary) -> Result<(), AppError> {
    let mut file = create(path)?;
    serde_json::to_writer_pretty(&mut file, summary)?;
    file.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arc::ApiError;
    use crate::state_machine::Step;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn audit_path_and_site_inference_agree() {
        let path = audit_report_path(Path::new("reports"), "el_sitio", 2021);
        assert_eq!(
            path,
            PathBuf::from("reports/el_sitio/notas_publicadas_el_sitio_2021.csv")
        );
        assert_eq!(infer_site(&path).as_deref(), Some("el_sitio"));
        assert_eq!(infer_site(Path::new("ids.csv")), None);
        assert_eq!(infer_site(Path::new("notas_publicadas_sitio_abc.csv")), None);
    }

    #[test]
    fn read_csv_accepts_header_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "export.csv",
            "ID,Date,Canonical_URL,Website,State\n\
             A,2021-01-01T00:00:00Z,/a/,sitio1,unpublished\n\
             ,2021-01-02T00:00:00Z,/b/,sitio1,\n\
             C,,,,bogus\n",
        );

        let items = read_csv(&path).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "A");
        assert_eq!(items[0].state, LifecycleState::Unpublished);
        assert_eq!(items[0].site.as_deref(), Some("sitio1"));
        assert_eq!(items[0].url.as_deref(), Some("/a/"));
        assert_eq!(items[1].id, "C");
        assert_eq!(items[1].state, LifecycleState::Unknown);
        assert!(items[1].publish_date.is_none());
        assert!(items[1].site.is_none());
    }

    #[test]
    fn read_csv_takes_site_from_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "notas_publicadas_sitio2_2020.csv",
            "story_id,publish_date,url\nA,2020-05-01T00:00:00Z,/a/\n",
        );
        let items = read_csv(&path).unwrap();
        assert_eq!(items[0].site.as_deref(), Some("sitio2"));
    }

    #[test]
    fn read_csv_without_id_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.csv", "url,date\n/a/,2020\n");
        assert!(matches!(read_csv(&path), Err(AppError::Input { .. })));
    }

    #[test]
    fn read_dir_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.csv", "story_id\nB1\n");
        write(dir.path(), "a.csv", "story_id\nA1\nA2\n");
        write(dir.path(), "notes.txt", "story_id\nX\n");

        let ids: Vec<_> = read_csv_dir(dir.path())
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["A1", "A2", "B1"]);
    }

    #[test]
    fn ids_file_skips_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "ids.txt", "# lote 1\nA\n\n  B  \n");
        let ids: Vec<_> = read_ids_file(&path).unwrap().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let items = vec![
            ContentItem::new("A"),
            ContentItem::new("B"),
            ContentItem::new("A").with_state(LifecycleState::Deleted),
        ];
        let unique = dedupe(items);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].state, LifecycleState::Unknown);
    }

    #[test]
    fn audit_csv_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = audit_report_path(dir.path(), "sitio", 2019);
        let mut item = ContentItem::new("A");
        item.publish_date = Some("2019-03-01T00:00:00Z".into());
        item.url = Some("/a/".into());

        write_audit_csv(&path, &[item, ContentItem::new("B")]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("story_id,publish_date,url\n"));
        let back = read_csv(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].site.as_deref(), Some("sitio"));
        assert_eq!(back[0].url.as_deref(), Some("/a/"));
        assert!(back[1].url.is_none());
    }

    #[test]
    fn empty_year_writes_no_report() {
        let dir = tempfile::tempdir().unwrap();

        let written = write_audit_report(dir.path(), "sitio", 2020, &[]).unwrap();

        assert!(written.is_none());
        assert!(!audit_report_path(dir.path(), "sitio", 2020).exists());
        assert!(!dir.path().join("sitio").exists());

        let written = write_audit_report(dir.path(), "sitio", 2021, &[ContentItem::new("A")]).unwrap();
        assert_eq!(written, Some(audit_report_path(dir.path(), "sitio", 2021)));
        assert_eq!(read_csv(&written.unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn video_csv_is_readable_as_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(VIDEO_REPORT_FILE);
        let video = |id: &str, site: &str| ContentItem {
            site: Some(site.to_string()),
            ..ContentItem::new(id)
        };
        let items = vec![video("V1", "sitio_a"), video("V2", "sitio_b")];

        write_video_csv(&path, &items).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("arc_id,website_name\nV1,sitio_a\n"));
        let back = read_csv(&path).unwrap();
        let pairs: Vec<_> = back
            .iter()
            .map(|i| (i.id.as_str(), i.site.as_deref()))
            .collect();
        assert_eq!(pairs, vec![("V1", Some("sitio_a")), ("V2", Some("sitio_b"))]);
    }

    #[test]
    fn outcomes_csv_has_one_row_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/outcomes.csv");
        let records = vec![
            OutcomeRecord::succeeded("A", Step::RemoveFromCirculation),
            OutcomeRecord::failed("A", Step::Unpublish, &ApiError::NotFound("revision".into())),
        ];

        write_outcomes_csv(&path, &records).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "story_id,step,status,error_kind,detail,timestamp");
        assert!(lines[1].starts_with("A,remove-from-circulation,succeeded,,,"));
        assert!(lines[2].starts_with("A,unpublish,failed,not-found,not found: revision,"));
    }
}
