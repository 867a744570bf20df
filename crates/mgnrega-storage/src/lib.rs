//! Paginated upstream fetch + immutable snapshot storage for the MGNREGA pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mgnrega_core::RawRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "mgnrega-storage";

pub const DEFAULT_API_BASE_URL: &str =
    "https://api.data.gov.in/resource/ee03643a-ee4c-48c2-ac30-9f2ff26ab722";

/// Optional district / financial-year filter applied to a fetch and recorded in its snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFilter {
    pub district: Option<String>,
    pub fin_year: Option<String>,
}

impl FetchFilter {
    /// Blank strings are treated as "no filter".
    pub fn new(district: Option<&str>, fin_year: Option<&str>) -> Self {
        let clean = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
        };
        Self {
            district: clean(district),
            fin_year: clean(fin_year),
        }
    }
}

impl fmt::Display for FetchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "district={} fin_year={}",
            self.district.as_deref().unwrap_or("*"),
            self.fin_year.as_deref().unwrap_or("*")
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PaginationConfig {
    pub page_size: usize,
    /// Fetching stops once the next offset would exceed this value.
    pub offset_ceiling: usize,
    pub page_delay: Duration,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            offset_ceiling: 100_000,
            page_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure at offset {offset}: {source}")]
    Transport {
        offset: usize,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} at offset {offset}")]
    HttpStatus { status: u16, offset: usize },
    #[error("no data found for {filter}")]
    NoData { filter: FetchFilter },
}

/// One page of upstream records. `Ok(None)` means the response carried no record list.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        filter: &FetchFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Option<Vec<RawRecord>>, FetchError>;
}

/// Walk offset pagination until a short page, the offset ceiling, or an empty response.
///
/// Transport failures abort the whole fetch; nothing is retried.
pub async fn fetch_all<S: PageSource + ?Sized>(
    source: &S,
    filter: &FetchFilter,
    config: &PaginationConfig,
) -> Result<Vec<RawRecord>, FetchError> {
    let page_size = config.page_size.max(1);
    let mut all = Vec::new();
    let mut offset = 0usize;
    let mut pages = 0usize;

    loop {
        let Some(records) = source.fetch_page(filter, page_size, offset).await? else {
            debug!(offset, "response had no record list; treating as end of data");
            break;
        };
        pages += 1;
        let count = records.len();
        all.extend(records);
        offset += page_size;

        if count < page_size {
            break;
        }
        if offset > config.offset_ceiling {
            warn!(
                offset,
                ceiling = config.offset_ceiling,
                "offset ceiling reached; stopping pagination"
            );
            break;
        }
        if !config.page_delay.is_zero() {
            tokio::time::sleep(config.page_delay).await;
        }
    }

    if all.is_empty() {
        return Err(FetchError::NoData {
            filter: filter.clone(),
        });
    }
    info!(records = all.len(), pages, %filter, "fetch complete");
    Ok(all)
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub state_name: String,
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: String::new(),
            state_name: "TAMIL NADU".to_string(),
            timeout: Duration::from_secs(20),
            user_agent: None,
        }
    }
}

/// data.gov.in resource client.
#[derive(Debug)]
pub struct DataGovClient {
    client: reqwest::Client,
    config: ApiConfig,
}

impl DataGovClient {
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client, config })
    }

    pub fn page_query(&self, filter: &FetchFilter, limit: usize, offset: usize) -> Vec<(String, String)> {
        let mut params = vec![
            ("api-key".to_string(), self.config.api_key.clone()),
            ("format".to_string(), "json".to_string()),
            ("filters[state_name]".to_string(), self.config.state_name.clone()),
        ];
        if let Some(district) = &filter.district {
            params.push(("filters[district_name]".to_string(), district.clone()));
        }
        if let Some(fin_year) = &filter.fin_year {
            params.push(("filters[fin_year]".to_string(), fin_year.clone()));
        }
        params.push(("limit".to_string(), limit.to_string()));
        params.push(("offset".to_string(), offset.to_string()));
        params
    }
}

#[async_trait]
impl PageSource for DataGovClient {
    async fn fetch_page(
        &self,
        filter: &FetchFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Option<Vec<RawRecord>>, FetchError> {
        let span = info_span!("api_page", offset, limit);
        async {
            let resp = self
                .client
                .get(&self.config.base_url)
                .query(&self.page_query(filter, limit, offset))
                .send()
                .await
                .map_err(|source| FetchError::Transport { offset, source })?;

            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    offset,
                });
            }

            let body = resp
                .bytes()
                .await
                .map_err(|source| FetchError::Transport { offset, source })?;
            Ok::<_, FetchError>(extract_records(&body))
        }
        .instrument(span)
        .await
    }
}

/// Pull the `records` array out of an API response body.
pub fn extract_records(body: &[u8]) -> Option<Vec<RawRecord>> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "response body is not JSON");
            return None;
        }
    };
    let records = value.get("records")?.as_array()?;
    Some(
        records
            .iter()
            .filter_map(|r| r.as_object().cloned())
            .collect(),
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub file_name: String,
    pub path: PathBuf,
    pub record_count: usize,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub byte_size: usize,
}

/// Directory listing entry; cheap to produce, no parsing.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotFile {
    pub file_name: String,
    pub path: PathBuf,
    pub modified_at: DateTime<Utc>,
    pub byte_size: u64,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no snapshot files in {}", dir.display())]
    NoSnapshot { dir: PathBuf },
    #[error("snapshot {} is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("snapshot io failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
    move |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Timestamped JSON captures of raw fetched records. Files are never rewritten.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sha256_hex(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// `mgnrega_[<district>_][<year>_]<timestamp>.json`, filter terms reduced to `[A-Za-z0-9_]`.
    pub fn snapshot_file_name(created_at: DateTime<Utc>, filter: &FetchFilter) -> String {
        let sanitize = |term: &str| {
            term.chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect::<String>()
        };
        let mut name = String::from("mgnrega_");
        for term in [&filter.district, &filter.fin_year].into_iter().flatten() {
            name.push_str(&sanitize(term));
            name.push('_');
        }
        name.push_str(&created_at.format("%Y%m%d_%H%M%S_%3f").to_string());
        name.push_str(".json");
        name
    }

    /// Creation time encoded in a snapshot name, ignoring filter prefixes and collision suffixes.
    pub fn snapshot_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
        let stem = file_name.strip_suffix(".json")?;
        let parts: Vec<&str> = stem.split('_').collect();
        let is_digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
        let window = parts
            .windows(3)
            .rev()
            .find(|w| is_digits(w[0], 8) && is_digits(w[1], 6) && is_digits(w[2], 3))?;
        let naive = NaiveDateTime::parse_from_str(&format!("{}{}", window[0], window[1]), "%Y%m%d%H%M%S").ok()?;
        let millis: i64 = window[2].parse().ok()?;
        Some(Utc.from_utc_datetime(&naive) + chrono::Duration::milliseconds(millis))
    }

    /// Persist one fetch as a pretty-printed JSON array via temp-file + atomic rename.
    pub async fn save(
        &self,
        records: &[RawRecord],
        filter: &FetchFilter,
    ) -> Result<SnapshotInfo, SnapshotError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(io_err(&self.root))?;

        let created_at = Utc::now();
        let mut file_name = Self::snapshot_file_name(created_at, filter);
        let mut path = self.root.join(&file_name);
        if fs::try_exists(&path).await.map_err(io_err(&path))? {
            let stem = file_name.trim_end_matches(".json").to_string();
            file_name = format!("{stem}_{}.json", &Uuid::new_v4().simple().to_string()[..8]);
            path = self.root.join(&file_name);
        }

        let bytes = serde_json::to_vec_pretty(records).map_err(|err| SnapshotError::Malformed {
            path: path.clone(),
            reason: err.to_string(),
        })?;

        let temp_path = self
            .root
            .join(format!(".{}.{}.tmp", Uuid::new_v4(), bytes.len()));
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .map_err(io_err(&temp_path))?;
        file.write_all(&bytes).await.map_err(io_err(&temp_path))?;
        file.flush().await.map_err(io_err(&temp_path))?;
        drop(file);

        if let Err(source) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(SnapshotError::Io { path, source });
        }

        info!(file = %file_name, records = records.len(), "snapshot saved");
        Ok(SnapshotInfo {
            file_name,
            path,
            record_count: records.len(),
            created_at,
            content_hash: Self::sha256_hex(&bytes),
            byte_size: bytes.len(),
        })
    }

    /// Snapshot files, newest modification time first. Ties go to the newer name timestamp.
    /// A missing directory lists as empty.
    pub async fn list(&self) -> Result<Vec<SnapshotFile>, SnapshotError> {
        if !fs::try_exists(&self.root).await.map_err(io_err(&self.root))? {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&self.root).await.map_err(io_err(&self.root))?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err(&self.root))? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.starts_with('.') || !file_name.ends_with(".json") {
                continue;
            }
            let path = entry.path();
            let meta = entry.metadata().await.map_err(io_err(&path))?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().map_err(io_err(&path))?;
            files.push(SnapshotFile {
                file_name,
                path,
                modified_at: DateTime::<Utc>::from(modified),
                byte_size: meta.len(),
            });
        }
        files.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| {
                    Self::snapshot_timestamp(&b.file_name).cmp(&Self::snapshot_timestamp(&a.file_name))
                })
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(files)
    }

    /// Most recently modified snapshot and its raw records.
    pub async fn latest(&self) -> Result<(SnapshotInfo, Vec<RawRecord>), SnapshotError> {
        let newest = self
            .list()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SnapshotError::NoSnapshot {
                dir: self.root.clone(),
            })?;
        self.load(&newest.path).await
    }

    pub async fn load(&self, path: &Path) -> Result<(SnapshotInfo, Vec<RawRecord>), SnapshotError> {
        let bytes = fs::read(path).await.map_err(io_err(path))?;
        let meta = fs::metadata(path).await.map_err(io_err(path))?;
        let malformed = |reason: String| SnapshotError::Malformed {
            path: path.to_path_buf(),
            reason,
        };

        let value: Value = serde_json::from_slice(&bytes).map_err(|err| malformed(err.to_string()))?;
        let records = match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    Value::Object(map) => Ok(map),
                    _ => Err(malformed(format!("element {idx} is not an object"))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Value::Object(map) => vec![map],
            _ => return Err(malformed("top-level value is neither array nor object".into())),
        };

        let info = SnapshotInfo {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            path: path.to_path_buf(),
            record_count: records.len(),
            created_at: meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now()),
            content_hash: Self::sha256_hex(&bytes),
            byte_size: bytes.len(),
        };
        Ok((info, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::SystemTime;
    use tempfile::tempdir;

    fn record(i: usize) -> RawRecord {
        json!({"district_name": "SALEM", "fin_year": "2023-24", "Total_Exp": i.to_string()})
            .as_object()
            .cloned()
            .expect("object")
    }

    /// Serves `total` records (or unlimited when `None`) and remembers requested offsets.
    struct FakeUpstream {
        total: Option<usize>,
        offsets: Mutex<Vec<usize>>,
        fail_at: Option<usize>,
        no_list: bool,
    }

    impl FakeUpstream {
        fn new(total: Option<usize>) -> Self {
            Self {
                total,
                offsets: Mutex::new(Vec::new()),
                fail_at: None,
                no_list: false,
            }
        }

        fn offsets(&self) -> Vec<usize> {
            self.offsets.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageSource for FakeUpstream {
        async fn fetch_page(
            &self,
            _filter: &FetchFilter,
            limit: usize,
            offset: usize,
        ) -> Result<Option<Vec<RawRecord>>, FetchError> {
            self.offsets.lock().unwrap().push(offset);
            if self.fail_at == Some(offset) {
                return Err(FetchError::HttpStatus { status: 503, offset });
            }
            if self.no_list {
                return Ok(None);
            }
            let end = match self.total {
                Some(total) => total.min(offset + limit),
                None => offset + limit,
            };
            Ok(Some((offset..end.max(offset)).map(record).collect()))
        }
    }

    fn fast(page_size: usize, offset_ceiling: usize) -> PaginationConfig {
        PaginationConfig {
            page_size,
            offset_ceiling,
            page_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn pagination_stops_on_short_page() {
        let upstream = FakeUpstream::new(Some(25));
        let records = fetch_all(&upstream, &FetchFilter::default(), &fast(10, 1_000))
            .await
            .expect("fetch");
        assert_eq!(records.len(), 25);
        assert_eq!(upstream.offsets(), vec![0, 10, 20]);
    }

    #[tokio::test]
    async fn pagination_exact_multiple_needs_one_empty_page() {
        let upstream = FakeUpstream::new(Some(20));
        let records = fetch_all(&upstream, &FetchFilter::default(), &fast(10, 1_000))
            .await
            .expect("fetch");
        assert_eq!(records.len(), 20);
        assert_eq!(upstream.offsets(), vec![0, 10, 20]);
    }

    #[tokio::test]
    async fn endless_upstream_is_cut_at_the_ceiling_without_repeating_offsets() {
        let upstream = FakeUpstream::new(None);
        let records = fetch_all(&upstream, &FetchFilter::default(), &fast(10, 50))
            .await
            .expect("fetch");
        let offsets = upstream.offsets();
        assert_eq!(offsets, vec![0, 10, 20, 30, 40, 50]);
        assert!(offsets.iter().all(|o| *o <= 50));
        assert_eq!(records.len(), 60);
    }

    #[tokio::test]
    async fn missing_record_list_ends_fetch_and_empty_is_no_data() {
        let mut upstream = FakeUpstream::new(Some(5));
        upstream.no_list = true;
        let filter = FetchFilter::new(Some("SALEM"), Some("2023-24"));
        let err = fetch_all(&upstream, &filter, &fast(10, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoData { ref filter } if filter.district.as_deref() == Some("SALEM")));
        assert_eq!(upstream.offsets(), vec![0]);
    }

    #[tokio::test]
    async fn upstream_failure_is_fatal_and_not_retried() {
        let mut upstream = FakeUpstream::new(None);
        upstream.fail_at = Some(20);
        let err = fetch_all(&upstream, &FetchFilter::default(), &fast(10, 1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 503, offset: 20 }));
        assert_eq!(upstream.offsets(), vec![0, 10, 20]);
    }

    #[test]
    fn extract_records_treats_odd_bodies_as_end_of_data() {
        assert!(extract_records(b"<html>maintenance</html>").is_none());
        assert!(extract_records(br#"{"message": "ok"}"#).is_none());
        assert!(extract_records(br#"{"records": "none"}"#).is_none());
        let records = extract_records(br#"{"records": [{"a": "1"}, {"a": "2"}]}"#).expect("list");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn page_query_carries_filters_and_paging() {
        let client = DataGovClient::new(ApiConfig {
            api_key: "k".into(),
            ..ApiConfig::default()
        })
        .expect("client");
        let params = client.page_query(&FetchFilter::new(Some("SALEM"), None), 1000, 2000);
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            ["api-key", "format", "filters[state_name]", "filters[district_name]", "limit", "offset"]
        );
        assert_eq!(params[5].1, "2000");
    }

    #[test]
    fn blank_filter_terms_are_dropped() {
        let filter = FetchFilter::new(Some("  "), Some("2023-24"));
        assert_eq!(filter.district, None);
        assert_eq!(filter.to_string(), "district=* fin_year=2023-24");
    }

    #[test]
    fn snapshot_names_encode_sanitized_filters() {
        let ts = DateTime::parse_from_rfc3339("2026-02-24T12:00:00Z")
            .expect("ts")
            .with_timezone(&Utc);
        let name = SnapshotStore::snapshot_file_name(
            ts,
            &FetchFilter::new(Some("THE NILGIRIS"), Some("2023-24")),
        );
        assert_eq!(name, "mgnrega_THE_NILGIRIS_2023_24_20260224_120000_000.json");
        assert_eq!(
            SnapshotStore::snapshot_file_name(ts, &FetchFilter::default()),
            "mgnrega_20260224_120000_000.json"
        );
    }

    #[tokio::test]
    async fn save_creates_directory_and_latest_reads_it_back() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path().join("data"));
        let records = vec![record(1), record(2)];

        let saved = store
            .save(&records, &FetchFilter::new(Some("SALEM"), None))
            .await
            .expect("save");
        assert!(saved.path.exists());
        assert!(saved.file_name.starts_with("mgnrega_SALEM_"));
        assert_eq!(saved.record_count, 2);

        let (info, loaded) = store.latest().await.expect("latest");
        assert_eq!(loaded, records);
        assert_eq!(info.content_hash, saved.content_hash);
    }

    #[tokio::test]
    async fn latest_follows_modification_time_not_name() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let older = dir.path().join("mgnrega_zzz_20990101_000000_000.json");
        let newer = dir.path().join("mgnrega_aaa_20000101_000000_000.json");
        std::fs::write(&older, r#"[{"district_name": "OLD"}]"#).unwrap();
        std::fs::write(&newer, r#"[{"district_name": "NEW"}]"#).unwrap();

        let now = SystemTime::now();
        let set_mtime = |path: &Path, at: SystemTime| {
            std::fs::File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(at)
                .unwrap();
        };
        set_mtime(&older, now - Duration::from_secs(3600));
        set_mtime(&newer, now);

        let (info, records) = store.latest().await.expect("latest");
        assert_eq!(info.path, newer);
        assert_eq!(records[0]["district_name"], json!("NEW"));
    }

    #[test]
    fn snapshot_timestamp_skips_prefixes_and_suffixes() {
        let expected = DateTime::parse_from_rfc3339("2026-02-24T12:30:05.250Z")
            .expect("ts")
            .with_timezone(&Utc);
        for name in [
            "mgnrega_20260224_123005_250.json",
            "mgnrega_THE_NILGIRIS_2023_24_20260224_123005_250.json",
            "mgnrega_20260224_123005_250_1a2b3c4d.json",
        ] {
            assert_eq!(SnapshotStore::snapshot_timestamp(name), Some(expected), "{name}");
        }
        assert_eq!(SnapshotStore::snapshot_timestamp("mgnrega_1.json"), None);
    }

    #[tokio::test]
    async fn equal_mtimes_fall_back_to_creation_timestamp() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let filtered_older = dir.path().join("mgnrega_SALEM_20260101_000000_000.json");
        let unfiltered_newer = dir.path().join("mgnrega_20260301_000000_000.json");
        std::fs::write(&filtered_older, r#"[{"district_name": "OLD"}]"#).unwrap();
        std::fs::write(&unfiltered_newer, r#"[{"district_name": "NEW"}]"#).unwrap();

        let at = SystemTime::now();
        for path in [&filtered_older, &unfiltered_newer] {
            std::fs::File::options()
                .write(true)
                .open(path)
                .unwrap()
                .set_modified(at)
                .unwrap();
        }

        let files = store.list().await.expect("list");
        assert_eq!(files[0].path, unfiltered_newer);
        let (_, records) = store.latest().await.expect("latest");
        assert_eq!(records[0]["district_name"], json!("NEW"));
    }

    #[tokio::test]
    async fn missing_or_empty_directory_has_no_snapshot() {
        let dir = tempdir().expect("tempdir");
        let store = SnapshotStore::new(dir.path().join("never-created"));
        assert!(matches!(
            store.latest().await,
            Err(SnapshotError::NoSnapshot { .. })
        ));
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(matches!(
            store.latest().await,
            Err(SnapshotError::NoSnapshot { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_snapshot_is_reported() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("mgnrega_1.json"), "[{\"a\": ").unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(matches!(
            store.latest().await,
            Err(SnapshotError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn single_object_snapshot_is_one_record() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("mgnrega_1.json"), r#"{"district_name": "SALEM"}"#).unwrap();
        let store = SnapshotStore::new(dir.path());
        let (info, records) = store.latest().await.expect("latest");
        assert_eq!(info.record_count, 1);
        assert_eq!(records[0]["district_name"], json!("SALEM"));
    }
}
