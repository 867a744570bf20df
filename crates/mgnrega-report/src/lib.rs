//! District reporting over the aggregation engine.
//!
//! A [`ReportService`] session probes the store once when it opens. A reachable store with a
//! readable table serves every call; otherwise the newest snapshot on disk is normalized into
//! memory and the same pure aggregation functions run over it. Both paths hand `mgnrega_core` identical
//! `Record` sequences, so callers get the same values either way and only the
//! informational [`DataPath`] tells them apart.

use async_trait::async_trait;
use mgnrega_core::{
    available_months, budget, distinct_districts, distinct_fin_years, monthly, normalize_record,
    overview, previous_fin_year, projects, scst, state_comparison, wages, year_over_year,
    year_totals, Budget, MonthlyPoint, Overview, ProgramMonth, Projects, RawRecord, Record, ScSt,
    StateComparison, Wages, YearOverYear,
};
use mgnrega_storage::{SnapshotError, SnapshotInfo, SnapshotStore};
use mgnrega_sync::{StoreError, StoreGateway};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "mgnrega-report";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataPath {
    Store,
    Snapshot,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no data available for {district} {fin_year}")]
    NoData { district: String, fin_year: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no data available: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Where a session's records come from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    fn data_path(&self) -> DataPath;

    async fn records(&self, district_name: &str, fin_year: &str) -> Result<Vec<Record>, ReportError>;

    async fn records_for_year(&self, fin_year: &str) -> Result<Vec<Record>, ReportError>;

    async fn districts(&self) -> Result<Vec<String>, ReportError>;

    async fn fin_years(&self) -> Result<Vec<String>, ReportError>;
}

pub struct StoreRecordSource {
    gateway: StoreGateway,
}

impl StoreRecordSource {
    pub fn new(gateway: StoreGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl RecordSource for StoreRecordSource {
    fn data_path(&self) -> DataPath {
        DataPath::Store
    }

    async fn records(&self, district_name: &str, fin_year: &str) -> Result<Vec<Record>, ReportError> {
        Ok(self.gateway.records_for(district_name, fin_year).await?)
    }

    async fn records_for_year(&self, fin_year: &str) -> Result<Vec<Record>, ReportError> {
        Ok(self.gateway.records_for_year(fin_year).await?)
    }

    async fn districts(&self) -> Result<Vec<String>, ReportError> {
        Ok(self.gateway.districts().await?)
    }

    async fn fin_years(&self) -> Result<Vec<String>, ReportError> {
        Ok(self.gateway.fin_years().await?)
    }
}

/// One snapshot held in memory, normalized once and filtered per call.
pub struct SnapshotRecordSource {
    snapshot: Option<SnapshotInfo>,
    records: Vec<Record>,
}

impl SnapshotRecordSource {
    pub async fn load_latest(store: &SnapshotStore) -> Result<Self, SnapshotError> {
        let (info, raw) = store.latest().await?;
        info!(file = %info.file_name, records = raw.len(), "snapshot loaded for reporting");
        let mut source = Self::from_raw(&raw);
        source.snapshot = Some(info);
        Ok(source)
    }

    pub fn from_raw(raw: &[RawRecord]) -> Self {
        Self {
            snapshot: None,
            records: raw
                .iter()
                .map(|r| Record::from_canonical(&normalize_record(r)))
                .collect(),
        }
    }

    pub fn snapshot(&self) -> Option<&SnapshotInfo> {
        self.snapshot.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordSource for SnapshotRecordSource {
    fn data_path(&self) -> DataPath {
        DataPath::Snapshot
    }

    async fn records(&self, district_name: &str, fin_year: &str) -> Result<Vec<Record>, ReportError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.matches(district_name, fin_year))
            .cloned()
            .collect())
    }

    async fn records_for_year(&self, fin_year: &str) -> Result<Vec<Record>, ReportError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.fin_year == fin_year)
            .cloned()
            .collect())
    }

    async fn districts(&self) -> Result<Vec<String>, ReportError> {
        Ok(distinct_districts(&self.records))
    }

    async fn fin_years(&self) -> Result<Vec<String>, ReportError> {
        Ok(distinct_fin_years(&self.records))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardRequest {
    pub district_name: String,
    pub fin_year: String,
    pub compare_year: Option<String>,
}

impl DashboardRequest {
    pub fn new(district_name: impl Into<String>, fin_year: impl Into<String>) -> Self {
        Self {
            district_name: district_name.into(),
            fin_year: fin_year.into(),
            compare_year: None,
        }
    }

    /// Compare against the financial year immediately before `fin_year`, when it has one.
    pub fn compare_with_previous(mut self) -> Self {
        self.compare_year = previous_fin_year(&self.fin_year);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub year_over_year: YearOverYear,
    pub previous_monthly: Vec<MonthlyPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub district_name: String,
    pub fin_year: String,
    pub data_path: DataPath,
    pub overview: Overview,
    pub monthly: Vec<MonthlyPoint>,
    pub scst: ScSt,
    pub projects: Projects,
    pub budget: Budget,
    pub wages: Wages,
    pub comparison: Option<Comparison>,
}

pub struct ReportService {
    source: Box<dyn RecordSource>,
}

impl ReportService {
    /// Probe the store once; fall back to the latest snapshot for the whole session when it is
    /// unreachable or holds no readable table.
    pub async fn open(gateway: &StoreGateway, snapshots: &SnapshotStore) -> Result<Self, ReportError> {
        let reason = if !gateway.health_check().await {
            "store unreachable"
        } else if !gateway.table_ready().await {
            "store has no readable table"
        } else {
            info!(path = "store", "report session opened");
            return Ok(Self::with_source(Box::new(StoreRecordSource::new(
                gateway.clone(),
            ))));
        };
        warn!(
            reason,
            snapshot_dir = %snapshots.root().display(),
            "serving reports from the latest snapshot"
        );
        let source = SnapshotRecordSource::load_latest(snapshots).await?;
        Ok(Self::with_source(Box::new(source)))
    }

    pub fn with_source(source: Box<dyn RecordSource>) -> Self {
        Self { source }
    }

    pub fn data_path(&self) -> DataPath {
        self.source.data_path()
    }

    async fn scoped(&self, district_name: &str, fin_year: &str) -> Result<Vec<Record>, ReportError> {
        self.source.records(district_name, fin_year).await
    }

    pub async fn overview(&self, district_name: &str, fin_year: &str) -> Result<Overview, ReportError> {
        Ok(overview(&self.scoped(district_name, fin_year).await?))
    }

    pub async fn monthly(&self, district_name: &str, fin_year: &str) -> Result<Vec<MonthlyPoint>, ReportError> {
        Ok(monthly(&self.scoped(district_name, fin_year).await?))
    }

    pub async fn scst(&self, district_name: &str, fin_year: &str) -> Result<ScSt, ReportError> {
        Ok(scst(&self.scoped(district_name, fin_year).await?))
    }

    pub async fn projects(&self, district_name: &str, fin_year: &str) -> Result<Projects, ReportError> {
        Ok(projects(&self.scoped(district_name, fin_year).await?))
    }

    pub async fn budget(&self, district_name: &str, fin_year: &str) -> Result<Budget, ReportError> {
        Ok(budget(&self.scoped(district_name, fin_year).await?))
    }

    pub async fn wages(&self, district_name: &str, fin_year: &str) -> Result<Wages, ReportError> {
        Ok(wages(&self.scoped(district_name, fin_year).await?))
    }

    pub async fn year_over_year(
        &self,
        district_name: &str,
        current_year: &str,
        previous_year: &str,
    ) -> Result<YearOverYear, ReportError> {
        let current = self.scoped(district_name, current_year).await?;
        let previous = self.scoped(district_name, previous_year).await?;
        Ok(year_over_year(
            district_name,
            year_totals(current_year, &current),
            year_totals(previous_year, &previous),
        ))
    }

    pub async fn state_comparison(
        &self,
        district_name: &str,
        fin_year: &str,
    ) -> Result<StateComparison, ReportError> {
        let year_records = self.source.records_for_year(fin_year).await?;
        Ok(state_comparison(district_name, fin_year, &year_records))
    }

    pub async fn available_months(
        &self,
        district_name: &str,
        fin_year: &str,
    ) -> Result<Vec<ProgramMonth>, ReportError> {
        Ok(available_months(&self.scoped(district_name, fin_year).await?))
    }

    pub async fn districts(&self) -> Result<Vec<String>, ReportError> {
        self.source.districts().await
    }

    pub async fn fin_years(&self) -> Result<Vec<String>, ReportError> {
        self.source.fin_years().await
    }

    /// Every aggregate for one district-year, plus the comparison year when requested.
    pub async fn dashboard(&self, request: &DashboardRequest) -> Result<Dashboard, ReportError> {
        let records = self.scoped(&request.district_name, &request.fin_year).await?;
        if records.is_empty() {
            return Err(ReportError::NoData {
                district: request.district_name.clone(),
                fin_year: request.fin_year.clone(),
            });
        }

        let comparison = match &request.compare_year {
            Some(compare_year) => {
                let previous = self.scoped(&request.district_name, compare_year).await?;
                Some(Comparison {
                    year_over_year: year_over_year(
                        &request.district_name,
                        year_totals(&request.fin_year, &records),
                        year_totals(compare_year, &previous),
                    ),
                    previous_monthly: monthly(&previous),
                })
            }
            None => None,
        };

        Ok(Dashboard {
            district_name: request.district_name.clone(),
            fin_year: request.fin_year.clone(),
            data_path: self.data_path(),
            overview: overview(&records),
            monthly: monthly(&records),
            scst: scst(&records),
            projects: projects(&records),
            budget: budget(&records),
            wages: wages(&records),
            comparison,
        })
    }
}
