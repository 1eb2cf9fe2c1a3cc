//! Shared page ledger for coordinated workers.
//!
//! Every operation opens its own connection to the SQLite file and drops it
//! on return, so any number of worker processes can share one ledger. The
//! busy timeout makes competing writers queue on the database lock instead
//! of failing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::CoordinatorError;
use crate::models::SearchCategory;

pub type Result<T> = std::result::Result<T, CoordinatorError>;

/// An assignment older than this is presumed abandoned.
pub const LEASE_TIMEOUT_MINUTES: i64 = 30;
/// Reclaims allowed per page before it is left alone.
pub const MAX_RECLAIMS: u32 = 3;

const BUSY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Pending,
    Assigned,
    Completed,
    Failed,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Pending => "pending",
            PageStatus::Assigned => "assigned",
            PageStatus::Completed => "completed",
            PageStatus::Failed => "failed",
        }
    }
}

impl FromStr for PageStatus {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(PageStatus::Pending),
            "assigned" => Ok(PageStatus::Assigned),
            "completed" => Ok(PageStatus::Completed),
            "failed" => Ok(PageStatus::Failed),
            other => Err(CoordinatorError::UnknownStatus { kind: "page", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Active,
    Idle,
    Dead,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Active => "active",
            WorkerStatus::Idle => "idle",
            WorkerStatus::Dead => "dead",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerStatus {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(WorkerStatus::Active),
            "idle" => Ok(WorkerStatus::Idle),
            "dead" => Ok(WorkerStatus::Dead),
            other => Err(CoordinatorError::UnknownStatus { kind: "worker", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWorkItem {
    pub category: SearchCategory,
    pub page_number: u32,
    pub status: PageStatus,
    pub worker_id: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRegistration {
    pub worker_id: String,
    pub hostname: String,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub pages_completed: u64,
    pub status: WorkerStatus,
}

/// Page counts of one category by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub total: u64,
    pub completed: u64,
    pub assigned: u64,
    pub pending: u64,
    pub failed: u64,
}

impl Progress {
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 * 100.0 / self.total as f64
    }
}

/// Fixed-width UTC text, so lexical order in SQL is time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(&v)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|source| CoordinatorError::Timestamp { value: v, source })
        })
        .transpose()
}

fn parse_category(value: String) -> Result<SearchCategory> {
    value.parse().map_err(|_| CoordinatorError::UnknownCategory(value))
}

type PageRow = (String, u32, String, Option<String>, Option<String>, Option<String>, u32);

fn page_from_row(row: PageRow) -> Result<PageWorkItem> {
    let (category, page_number, status, worker_id, assigned_at, completed_at, retry_count) = row;
    Ok(PageWorkItem {
        category: parse_category(category)?,
        page_number,
        status: status.parse()?,
        worker_id,
        assigned_at: parse_timestamp(assigned_at)?,
        completed_at: parse_timestamp(completed_at)?,
        retry_count,
    })
}

pub struct WorkCoordinator {
    db_path: PathBuf,
}

impl WorkCoordinator {
    /// Opens (creating if needed) the ledger at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let coordinator = WorkCoordinator { db_path: db_path.as_ref().to_path_buf() };
        coordinator.init_schema()?;
        Ok(coordinator)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                worker_id TEXT,
                assigned_at TEXT,
                completed_at TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                UNIQUE(category, page_number)
            );

            CREATE TABLE IF NOT EXISTS workers (
                worker_id TEXT PRIMARY KEY,
                hostname TEXT NOT NULL DEFAULT '',
                last_heartbeat TEXT,
                pages_completed INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active'
            );

            CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(category, status, page_number);
            "#,
        )?;
        Ok(())
    }

    /// Inserts pages `1..=total_pages` as pending unless the category already
    /// has pages. Returns whether anything was inserted.
    pub fn initialize_pages(&self, category: SearchCategory, total_pages: u32) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM pages WHERE category = ?1",
            params![category.as_str()],
            |row| row.get(0),
        )?;
        if existing > 0 {
            info!("Pages already initialized for {} ({} pages)", category, existing);
            return Ok(false);
        }

        {
            let mut insert = tx.prepare("INSERT OR IGNORE INTO pages (category, page_number) VALUES (?1, ?2)")?;
            for page in 1..=total_pages {
                insert.execute(params![category.as_str(), page])?;
            }
        }
        tx.commit()?;
        info!("Initialized {} pages for {}", total_pages, category);
        Ok(true)
    }

    pub fn register_worker(&self, worker_id: &str, hostname: &str) -> Result<()> {
        self.register_worker_at(worker_id, hostname, Utc::now())
    }

    /// Upsert. A returning worker keeps its completed count.
    pub fn register_worker_at(&self, worker_id: &str, hostname: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO workers (worker_id, hostname, last_heartbeat, status)
            VALUES (?1, ?2, ?3, 'active')
            ON CONFLICT(worker_id) DO UPDATE SET
                hostname = excluded.hostname,
                last_heartbeat = excluded.last_heartbeat,
                status = 'active'
            "#,
            params![worker_id, hostname, timestamp(now)],
        )?;
        info!("Registered worker {} on {}", worker_id, hostname);
        Ok(())
    }

    pub fn get_next_page(&self, category: SearchCategory, worker_id: &str) -> Result<Option<u32>> {
        self.get_next_page_at(category, worker_id, Utc::now())
    }

    /// Reclaims expired leases of `category`, then leases its lowest pending
    /// page to `worker_id`. Both steps run in one exclusive transaction, so
    /// no two callers can receive the same page. `None` means nothing is
    /// pending right now; other workers may still hold leases.
    pub fn get_next_page_at(
        &self,
        category: SearchCategory,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;

        let cutoff = now - chrono::Duration::minutes(LEASE_TIMEOUT_MINUTES);
        let reclaimed = tx.execute(
            r#"
            UPDATE pages
            SET status = 'pending', worker_id = NULL, retry_count = retry_count + 1
            WHERE category = ?1
              AND status = 'assigned'
              AND assigned_at < ?2
              AND retry_count < ?3
            "#,
            params![category.as_str(), timestamp(cutoff), MAX_RECLAIMS],
        )?;
        if reclaimed > 0 {
            warn!("Reclaimed {} abandoned {} pages", reclaimed, category);
        }

        let next: Option<u32> = tx
            .query_row(
                r#"
                SELECT page_number FROM pages
                WHERE category = ?1 AND status = 'pending'
                ORDER BY page_number
                LIMIT 1
                "#,
                params![category.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(page) = next {
            tx.execute(
                r#"
                UPDATE pages
                SET status = 'assigned', worker_id = ?1, assigned_at = ?2
                WHERE category = ?3 AND page_number = ?4
                "#,
                params![worker_id, timestamp(now), category.as_str(), page],
            )?;
        }
        tx.commit()?;
        Ok(next)
    }

    pub fn mark_page_complete(&self, category: SearchCategory, page: u32, worker_id: &str) -> Result<bool> {
        self.mark_page_complete_at(category, page, worker_id, Utc::now())
    }

    /// Completes `page` only if `worker_id` still holds its lease. A worker
    /// whose lease was reclaimed and handed on gets `false` and no credit.
    pub fn mark_page_complete_at(
        &self,
        category: SearchCategory,
        page: u32,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let at = timestamp(now);

        let updated = tx.execute(
            r#"
            UPDATE pages
            SET status = 'completed', completed_at = ?1
            WHERE category = ?2 AND page_number = ?3 AND worker_id = ?4 AND status = 'assigned'
            "#,
            params![at, category.as_str(), page, worker_id],
        )?;

        if updated > 0 {
            tx.execute(
                "UPDATE workers SET pages_completed = pages_completed + 1, last_heartbeat = ?1 WHERE worker_id = ?2",
                params![at, worker_id],
            )?;
        } else {
            warn!(
                "Worker {} no longer holds {} page {}; completion ignored",
                worker_id, category, page
            );
            tx.execute(
                "UPDATE workers SET last_heartbeat = ?1 WHERE worker_id = ?2",
                params![at, worker_id],
            )?;
        }
        tx.commit()?;
        Ok(updated > 0)
    }

    /// Owner-guarded move of a leased page to `failed`.
    pub fn mark_page_failed(&self, category: SearchCategory, page: u32, worker_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let updated = conn.execute(
            r#"
            UPDATE pages
            SET status = 'failed'
            WHERE category = ?1 AND page_number = ?2 AND worker_id = ?3 AND status = 'assigned'
            "#,
            params![category.as_str(), page, worker_id],
        )?;
        if updated > 0 {
            warn!("Worker {} marked {} page {} failed", worker_id, category, page);
        }
        Ok(updated > 0)
    }

    pub fn heartbeat(&self, worker_id: &str) -> Result<()> {
        self.heartbeat_at(worker_id, Utc::now())
    }

    pub fn heartbeat_at(&self, worker_id: &str, now: DateTime<Utc>) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE workers SET last_heartbeat = ?1 WHERE worker_id = ?2",
            params![timestamp(now), worker_id],
        )?;
        Ok(())
    }

    pub fn set_worker_status(&self, worker_id: &str, status: WorkerStatus) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE workers SET status = ?1 WHERE worker_id = ?2",
            params![status.as_str(), worker_id],
        )?;
        Ok(())
    }

    /// Flags active workers silent for longer than a lease as dead.
    pub fn mark_dead_workers(&self) -> Result<usize> {
        self.mark_dead_workers_at(Utc::now(), chrono::Duration::minutes(LEASE_TIMEOUT_MINUTES))
    }

    /// Flags active workers silent for longer than `stale_after` as dead.
    /// Their leases are left to the normal reclamation sweep. Idle workers
    /// drained their queue and stay idle.
    pub fn mark_dead_workers_at(&self, now: DateTime<Utc>, stale_after: chrono::Duration) -> Result<usize> {
        let conn = self.connect()?;
        let cutoff = timestamp(now - stale_after);
        let marked = conn.execute(
            r#"
            UPDATE workers
            SET status = 'dead'
            WHERE status = 'active' AND (last_heartbeat IS NULL OR last_heartbeat < ?1)
            "#,
            params![cutoff],
        )?;
        if marked > 0 {
            warn!("Marked {} silent workers dead", marked);
        }
        Ok(marked)
    }

    pub fn page_item(&self, category: SearchCategory, page: u32) -> Result<Option<PageWorkItem>> {
        let conn = self.connect()?;
        let row: Option<PageRow> = conn
            .query_row(
                r#"
                SELECT category, page_number, status, worker_id, assigned_at, completed_at, retry_count
                FROM pages WHERE category = ?1 AND page_number = ?2
                "#,
                params![category.as_str(), page],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;
        row.map(page_from_row).transpose()
    }

    pub fn get_progress(&self, category: SearchCategory) -> Result<Progress> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM pages WHERE category = ?1 GROUP BY status")?;
        let counts = stmt
            .query_map(params![category.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut progress = Progress::default();
        for (status, count) in counts {
            let count = count.max(0) as u64;
            progress.total += count;
            match status.parse::<PageStatus>()? {
                PageStatus::Pending => progress.pending = count,
                PageStatus::Assigned => progress.assigned = count,
                PageStatus::Completed => progress.completed = count,
                PageStatus::Failed => progress.failed = count,
            }
        }
        Ok(progress)
    }

    /// All registered workers, most productive first.
    pub fn get_worker_stats(&self) -> Result<Vec<WorkerRegistration>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT worker_id, hostname, last_heartbeat, pages_completed, status
            FROM workers
            ORDER BY pages_completed DESC, worker_id
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(worker_id, hostname, last_heartbeat, pages_completed, status)| {
                Ok(WorkerRegistration {
                    worker_id,
                    hostname,
                    last_heartbeat: parse_timestamp(last_heartbeat)?,
                    pages_completed: pages_completed.max(0) as u64,
                    status: status.parse()?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ledger() -> (tempfile::TempDir, WorkCoordinator) {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = WorkCoordinator::new(dir.path().join("coordinator.db")).unwrap();
        (dir, coordinator)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn initialize_is_idempotent() {
        let (_dir, c) = ledger();
        assert!(c.initialize_pages(SearchCategory::Pending, 5).unwrap());
        assert!(!c.initialize_pages(SearchCategory::Pending, 5).unwrap());
        assert!(!c.initialize_pages(SearchCategory::Pending, 9).unwrap());

        let progress = c.get_progress(SearchCategory::Pending).unwrap();
        assert_eq!(progress, Progress { total: 5, pending: 5, ..Progress::default() });
        assert_eq!(c.get_progress(SearchCategory::Conviction).unwrap().total, 0);
    }

    #[test]
    fn pages_are_leased_lowest_first() {
        let (_dir, c) = ledger();
        c.initialize_pages(SearchCategory::Conviction, 3).unwrap();
        c.register_worker_at("w1", "host-a", t0()).unwrap();

        assert_eq!(c.get_next_page_at(SearchCategory::Conviction, "w1", t0()).unwrap(), Some(1));
        assert_eq!(c.get_next_page_at(SearchCategory::Conviction, "w2", t0()).unwrap(), Some(2));

        let item = c.page_item(SearchCategory::Conviction, 1).unwrap().unwrap();
        assert_eq!(item.status, PageStatus::Assigned);
        assert_eq!(item.worker_id.as_deref(), Some("w1"));
        assert_eq!(item.assigned_at, Some(t0()));
        // pending pages of another category are never handed out
        assert_eq!(c.get_next_page_at(SearchCategory::Pending, "w1", t0()).unwrap(), None);
    }

    #[test]
    fn expired_leases_are_reclaimed_once_per_sweep() {
        let (_dir, c) = ledger();
        c.initialize_pages(SearchCategory::Pending, 1).unwrap();
        assert_eq!(c.get_next_page_at(SearchCategory::Pending, "w1", t0()).unwrap(), Some(1));

        // not yet expired
        let almost = t0() + chrono::Duration::minutes(LEASE_TIMEOUT_MINUTES);
        assert_eq!(c.get_next_page_at(SearchCategory::Pending, "w2", almost).unwrap(), None);

        let later = almost + chrono::Duration::seconds(1);
        assert_eq!(c.get_next_page_at(SearchCategory::Pending, "w2", later).unwrap(), Some(1));
        let item = c.page_item(SearchCategory::Pending, 1).unwrap().unwrap();
        assert_eq!(item.retry_count, 1);
        assert_eq!(item.worker_id.as_deref(), Some("w2"));
    }

    #[test]
    fn pages_out_of_retries_stay_assigned() {
        let (_dir, c) = ledger();
        c.initialize_pages(SearchCategory::Pending, 1).unwrap();
        let mut now = t0();
        c.get_next_page_at(SearchCategory::Pending, "w0", now).unwrap();

        for attempt in 1..=MAX_RECLAIMS {
            now += chrono::Duration::hours(1);
            let worker = format!("w{}", attempt);
            assert_eq!(c.get_next_page_at(SearchCategory::Pending, &worker, now).unwrap(), Some(1));
        }
        now += chrono::Duration::hours(1);
        assert_eq!(c.get_next_page_at(SearchCategory::Pending, "late", now).unwrap(), None);

        let item = c.page_item(SearchCategory::Pending, 1).unwrap().unwrap();
        assert_eq!(item.status, PageStatus::Assigned);
        assert_eq!(item.retry_count, MAX_RECLAIMS);
        assert_eq!(item.worker_id.as_deref(), Some("w3"));
    }

    #[test]
    fn completion_is_guarded_by_owner() {
        let (_dir, c) = ledger();
        c.initialize_pages(SearchCategory::Pending, 1).unwrap();
        c.register_worker_at("old", "a", t0()).unwrap();
        c.register_worker_at("new", "b", t0()).unwrap();

        c.get_next_page_at(SearchCategory::Pending, "old", t0()).unwrap();
        let later = t0() + chrono::Duration::minutes(45);
        assert_eq!(c.get_next_page_at(SearchCategory::Pending, "new", later).unwrap(), Some(1));

        assert!(!c.mark_page_complete_at(SearchCategory::Pending, 1, "old", later).unwrap());
        let item = c.page_item(SearchCategory::Pending, 1).unwrap().unwrap();
        assert_eq!(item.status, PageStatus::Assigned);

        assert!(c.mark_page_complete_at(SearchCategory::Pending, 1, "new", later).unwrap());
        let item = c.page_item(SearchCategory::Pending, 1).unwrap().unwrap();
        assert_eq!(item.status, PageStatus::Completed);
        assert_eq!(item.completed_at, Some(later));

        let stats = c.get_worker_stats().unwrap();
        assert_eq!(stats[0].worker_id, "new");
        assert_eq!(stats[0].pages_completed, 1);
        assert_eq!(stats[1].pages_completed, 0);
    }

    #[test]
    fn failed_pages_leave_the_queue() {
        let (_dir, c) = ledger();
        c.initialize_pages(SearchCategory::Conviction, 2).unwrap();
        c.get_next_page_at(SearchCategory::Conviction, "w1", t0()).unwrap();

        assert!(!c.mark_page_failed(SearchCategory::Conviction, 1, "intruder").unwrap());
        assert!(c.mark_page_failed(SearchCategory::Conviction, 1, "w1").unwrap());
        assert_eq!(c.get_next_page_at(SearchCategory::Conviction, "w1", t0()).unwrap(), Some(2));

        let progress = c.get_progress(SearchCategory::Conviction).unwrap();
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.assigned, 1);
    }

    #[test]
    fn reregistration_keeps_counts_and_revives() {
        let (_dir, c) = ledger();
        c.initialize_pages(SearchCategory::Pending, 1).unwrap();
        c.register_worker_at("w1", "a", t0()).unwrap();
        c.get_next_page_at(SearchCategory::Pending, "w1", t0()).unwrap();
        c.mark_page_complete_at(SearchCategory::Pending, 1, "w1", t0()).unwrap();

        let much_later = t0() + chrono::Duration::hours(2);
        assert_eq!(c.mark_dead_workers_at(much_later, chrono::Duration::minutes(10)).unwrap(), 1);
        assert_eq!(c.get_worker_stats().unwrap()[0].status, WorkerStatus::Dead);

        c.register_worker_at("w1", "a2", much_later).unwrap();
        let w = &c.get_worker_stats().unwrap()[0];
        assert_eq!(w.status, WorkerStatus::Active);
        assert_eq!(w.hostname, "a2");
        assert_eq!(w.pages_completed, 1);
        assert_eq!(w.last_heartbeat, Some(much_later));
    }

    #[test]
    fn only_silent_active_workers_die() {
        let (_dir, c) = ledger();
        c.register_worker_at("busy", "a", t0()).unwrap();
        c.register_worker_at("done", "b", t0()).unwrap();
        c.set_worker_status("done", WorkerStatus::Idle).unwrap();
        c.register_worker_at("fresh", "c", t0() + chrono::Duration::minutes(50)).unwrap();

        let now = t0() + chrono::Duration::minutes(55);
        assert_eq!(c.mark_dead_workers_at(now, chrono::Duration::minutes(LEASE_TIMEOUT_MINUTES)).unwrap(), 1);

        let status_of = |id: &str| {
            c.get_worker_stats().unwrap().into_iter().find(|w| w.worker_id == id).unwrap().status
        };
        assert_eq!(status_of("busy"), WorkerStatus::Dead);
        assert_eq!(status_of("done"), WorkerStatus::Idle);
        assert_eq!(status_of("fresh"), WorkerStatus::Active);
        // a second sweep finds nothing new
        assert_eq!(c.mark_dead_workers_at(now, chrono::Duration::minutes(LEASE_TIMEOUT_MINUTES)).unwrap(), 0);
    }

    #[test]
    fn progress_percent() {
        let p = Progress { total: 8, completed: 2, ..Progress::default() };
        assert!((p.percent_complete() - 25.0).abs() < f64::EPSILON);
        assert_eq!(Progress::default().percent_complete(), 0.0);
    }
}
