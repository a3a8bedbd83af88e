/// Result index: the ordered NDVI records of the project being viewed
///
/// The record set is only ever replaced as a whole. Readers hold an
/// `Arc<[NdviRecord]>`, so a reload never mutates a slice someone else is
/// looking at, and pointer identity tells the chart when to re-render.
///
/// Loads are tagged with a [`LoadTicket`]. A result is applied only if its
/// ticket is the latest one issued for the current project; anything else
/// is stale and dropped.
use std::sync::Arc;

use super::data::{NdviRecord, ProjectId};
use crate::error::FetchError;

/// Identifies one fetch of `GET /projects/{id}/ndvi`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub project: ProjectId,
    seq: u64,
    /// Keep the selected record (by id) instead of resetting to the first one
    preserve_selection: bool,
}

/// What happened to a finished load
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Records replaced; carries the new length
    Applied(usize),
    /// The fetch failed; previous records are still in place
    Failed(FetchError),
    /// A newer load or another project superseded this one
    Stale,
}

#[derive(Debug, Clone)]
pub struct ResultIndex {
    project: Option<ProjectId>,
    records: Arc<[NdviRecord]>,
    selected: Option<usize>,
    issued: u64,
    loading: bool,
    last_error: Option<FetchError>,
}

impl Default for ResultIndex {
    fn default() -> Self {
        Self {
            project: None,
            records: Arc::from(Vec::new()),
            selected: None,
            issued: 0,
            loading: false,
            last_error: None,
        }
    }
}

impl ResultIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load for `project`
    ///
    /// Switching to another project drops the old records immediately so
    /// nothing from project A is ever shown under project B.
    pub fn begin_load(&mut self, project: ProjectId, preserve_selection: bool) -> LoadTicket {
        if self.project != Some(project) {
            self.project = Some(project);
            self.records = Arc::from(Vec::new());
            self.selected = None;
            self.last_error = None;
        }
        self.issued += 1;
        self.loading = true;
        LoadTicket {
            project,
            seq: self.issued,
            preserve_selection,
        }
    }

    /// Apply the result of a load started with `ticket`
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<NdviRecord>, FetchError>,
    ) -> LoadOutcome {
        if self.project != Some(ticket.project) || ticket.seq != self.issued {
            tracing::debug!(
                "Ignoring stale NDVI load for project {} (seq {})",
                ticket.project,
                ticket.seq
            );
            return LoadOutcome::Stale;
        }

        self.loading = false;
        match result {
            Ok(records) => {
                self.replace(records, ticket.preserve_selection);
                self.last_error = None;
                tracing::info!(
                    "📊 Loaded {} NDVI records for project {}",
                    self.records.len(),
                    ticket.project
                );
                LoadOutcome::Applied(self.records.len())
            }
            Err(e) => {
                tracing::warn!("NDVI load for project {} failed: {}", ticket.project, e);
                self.last_error = Some(e.clone());
                LoadOutcome::Failed(e)
            }
        }
    }

    /// Swap in a new record set, sorted ascending by capture time (ties by id)
    pub fn replace(&mut self, mut records: Vec<NdviRecord>, preserve_selection: bool) {
        records.sort_by(|a, b| a.captured_at.cmp(&b.captured_at).then(a.id.cmp(&b.id)));

        let previous_id = self.current().map(|r| r.id);
        let previous_pos = self.selected;
        self.records = Arc::from(records);

        self.selected = if self.records.is_empty() {
            None
        } else if preserve_selection {
            previous_id
                .and_then(|id| self.records.iter().position(|r| r.id == id))
                .or_else(|| previous_pos.map(|p| p.min(self.records.len() - 1)))
                .or(Some(0))
        } else {
            Some(0)
        };
    }

    /// Leave the project view; any in-flight load becomes stale
    pub fn detach(&mut self) {
        self.project = None;
        self.records = Arc::from(Vec::new());
        self.selected = None;
        self.loading = false;
        self.last_error = None;
    }

    pub fn project(&self) -> Option<ProjectId> {
        self.project
    }

    /// Shared handle to the current record set
    pub fn records(&self) -> Arc<[NdviRecord]> {
        Arc::clone(&self.records)
    }

    pub fn as_slice(&self) -> &[NdviRecord] {
        &self.records
    }

    pub fn selected_position(&self) -> Option<usize> {
        self.selected
    }

    pub(crate) fn set_selected(&mut self, position: Option<usize>) {
        self.selected = position;
    }

    /// The selected record, or None when the index is empty
    pub fn current(&self) -> Option<&NdviRecord> {
        self.selected.and_then(|i| self.records.get(i))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }
}
