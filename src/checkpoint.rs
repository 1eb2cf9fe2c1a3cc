use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;
use crate::models::SearchCategory;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryProgress {
    pub last_page: u32,
    #[serde(alias = "last_href")]
    pub last_item_ref: Option<String>,
    pub completed: bool,
    pub total_processed: u64,
}

/// Daily docket progress, tracked per court.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyDocketProgress {
    pub last_court_code: Option<String>,
    pub completed_courts: Vec<String>,
    pub completed: bool,
}

/// On-disk checkpoint document. Unknown keys are ignored on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointState {
    pub pending: CategoryProgress,
    pub conviction: CategoryProgress,
    pub daily_docket: DailyDocketProgress,
    pub last_update: Option<String>,
}

impl CheckpointState {
    pub fn category(&self, category: SearchCategory) -> &CategoryProgress {
        match category {
            SearchCategory::Pending => &self.pending,
            SearchCategory::Conviction => &self.conviction,
        }
    }

    fn category_mut(&mut self, category: SearchCategory) -> &mut CategoryProgress {
        match category {
            SearchCategory::Pending => &mut self.pending,
            SearchCategory::Conviction => &mut self.conviction,
        }
    }
}

/// Standalone-mode traversal progress, owned by one process.
///
/// Progress is flushed every `flush_every` pages and on category completion,
/// so a crash loses at most one interval of work.
pub struct ResumeCheckpoint {
    path: PathBuf,
    flush_every: u32,
    state: CheckpointState,
}

impl ResumeCheckpoint {
    pub fn load<P: AsRef<Path>>(path: P, flush_every: u32) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = Self::read_state(&path);
        ResumeCheckpoint { path, flush_every, state }
    }

    fn read_state(path: &Path) -> CheckpointState {
        if !path.exists() {
            info!("No checkpoint at {:?}. Starting fresh.", path);
            return CheckpointState::default();
        }
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to read checkpoint {:?}: {}", path, e);
                return CheckpointState::default();
            }
        };
        match serde_json::from_str::<CheckpointState>(&content) {
            Ok(state) => {
                info!(
                    "Resumed checkpoint: pending at page {}, conviction at page {}.",
                    state.pending.last_page, state.conviction.last_page
                );
                state
            }
            Err(e) => {
                error!("Failed to parse checkpoint {:?}: {}. Starting fresh.", path, e);
                CheckpointState::default()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    pub fn progress(&self, category: SearchCategory) -> &CategoryProgress {
        self.state.category(category)
    }

    /// Writes the whole document through a temp file and a rename.
    pub fn persist(&mut self) -> Result<(), CheckpointError> {
        self.state.last_update = Some(Local::now().to_rfc3339());
        let json = serde_json::to_string_pretty(&self.state)?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn flush(&mut self) {
        if let Err(e) = self.persist() {
            error!("Failed to save checkpoint {:?}: {}", self.path, e);
        }
    }

    /// Records that `page` is done. A page lower than the stored one is
    /// refused. Returns whether the update was applied.
    pub fn update_progress(
        &mut self,
        category: SearchCategory,
        page: u32,
        last_item_ref: Option<String>,
        total_processed: u64,
    ) -> bool {
        let progress = self.state.category_mut(category);
        if page < progress.last_page {
            warn!(
                "Ignoring {} progress for page {}: checkpoint is already at page {}",
                category, page, progress.last_page
            );
            return false;
        }
        progress.last_page = page;
        if last_item_ref.is_some() {
            progress.last_item_ref = last_item_ref;
        }
        progress.total_processed = total_processed;

        if self.flush_every > 0 && page % self.flush_every == 0 {
            info!("Checkpoint: {} page {} ({} records)", category, page, total_processed);
            self.flush();
        }
        true
    }

    pub fn mark_complete(&mut self, category: SearchCategory) {
        self.state.category_mut(category).completed = true;
        info!("Marked {} search complete", category);
        self.flush();
    }

    pub fn should_skip(&self, category: SearchCategory) -> bool {
        self.progress(category).completed
    }

    pub fn daily_progress(&self) -> &DailyDocketProgress {
        &self.state.daily_docket
    }

    /// Records a finished court and flushes at once.
    pub fn mark_court_complete(&mut self, court_code: &str) {
        let daily = &mut self.state.daily_docket;
        if !daily.completed_courts.iter().any(|c| c == court_code) {
            daily.completed_courts.push(court_code.to_string());
        }
        daily.last_court_code = Some(court_code.to_string());
        info!("Marked court {} complete for the daily docket", court_code);
        self.flush();
    }

    pub fn should_skip_court(&self, court_code: &str) -> bool {
        self.state.daily_docket.completed_courts.iter().any(|c| c == court_code)
    }

    pub fn mark_daily_complete(&mut self) {
        self.state.daily_docket.completed = true;
        info!("Marked daily docket complete");
        self.flush();
    }

    /// Page to resume from. 0 and 1 both mean a fresh start; otherwise the
    /// stored page itself is replayed, since work on it may not have finished.
    pub fn resume_page(&self, category: SearchCategory) -> u32 {
        self.progress(category).last_page
    }

    /// Asks on `output` and reads the answer from `input`. Only `y` discards
    /// the stored checkpoint. Returns whether it did.
    pub fn reset<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> Result<bool, CheckpointError> {
        write!(output, "Are you sure you want to reset all checkpoint data? (y/n): ")?;
        output.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        if answer.trim().to_lowercase() != "y" {
            info!("Checkpoint reset cancelled");
            return Ok(false);
        }

        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        self.state = CheckpointState::default();
        info!("Checkpoint reset");
        Ok(true)
    }
}
