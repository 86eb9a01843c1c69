//! Acknowledgment workflow for AI-recommended forecast methods
//!
//! Switching a record to AI_FORECAST opens a review that stays PENDING until
//! the user explicitly acknowledges or rejects it. Every decision is written
//! to an append-only log; the current state of a record is read from its
//! latest entry unless a review is open.

use chrono::{DateTime, Utc};
use curve_math::Method;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Workflow state of one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewState {
    /// Nothing to review
    #[serde(rename = "NONE")]
    None,
    /// Review open; closing is blocked until a decision is made
    #[serde(rename = "PENDING")]
    Pending,
    /// Latest decision accepted the AI forecast
    #[serde(rename = "ACKNOWLEDGED")]
    Acknowledged,
    /// Latest decision rejected the AI forecast
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReviewState::None => "NONE",
            ReviewState::Pending => "PENDING",
            ReviewState::Acknowledged => "ACKNOWLEDGED",
            ReviewState::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

/// Answer to a request to leave the review
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewExit {
    /// No open review, the caller may close
    Closed,
    /// Review still pending; the caller must ask for acknowledge-or-reject
    ConfirmationRequired { record_id: String },
}

impl ReviewExit {
    pub fn is_blocked(&self) -> bool {
        matches!(self, ReviewExit::ConfirmationRequired { .. })
    }
}

/// Audit entry for one accept/reject decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub record_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub accepted: bool,
    /// Method active before the switch to AI_FORECAST
    pub previous_method: Method,
    pub reasoning: String,
}

impl Acknowledgment {
    /// State this entry leaves the record in
    pub fn resulting_state(&self) -> ReviewState {
        if self.accepted {
            ReviewState::Acknowledged
        } else {
            ReviewState::Rejected
        }
    }
}

/// Append-only list of decisions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcknowledgmentLog {
    entries: Vec<Acknowledgment>,
}

impl AcknowledgmentLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<Acknowledgment>) -> Self {
        Self { entries }
    }

    pub fn append(&mut self, entry: Acknowledgment) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Acknowledgment> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[Acknowledgment] {
        &self.entries
    }

    pub fn entries_for<'a>(&'a self, record_id: &'a str) -> impl Iterator<Item = &'a Acknowledgment> {
        self.entries.iter().filter(move |e| e.record_id == record_id)
    }

    pub fn latest_for(&self, record_id: &str) -> Option<&Acknowledgment> {
        self.entries.iter().rev().find(|e| e.record_id == record_id)
    }
}

/// Acknowledgment log, previous-method memo and open reviews for one project
#[derive(Debug, Clone, Default)]
pub struct AcknowledgmentStore {
    log: AcknowledgmentLog,
    previous_methods: BTreeMap<String, Method>,
    pending: BTreeSet<String>,
}

impl AcknowledgmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted state; open reviews are rebuilt separately
    pub fn restore(entries: Vec<Acknowledgment>, previous_methods: BTreeMap<String, Method>) -> Self {
        Self {
            log: AcknowledgmentLog::from_entries(entries),
            previous_methods,
            pending: BTreeSet::new(),
        }
    }

    pub fn log(&self) -> &AcknowledgmentLog {
        &self.log
    }

    pub fn previous_methods(&self) -> &BTreeMap<String, Method> {
        &self.previous_methods
    }

    /// Current workflow state for a record
    pub fn state(&self, record_id: &str) -> ReviewState {
        if self.pending.contains(record_id) {
            return ReviewState::Pending;
        }
        self.log
            .latest_for(record_id)
            .map_or(ReviewState::None, Acknowledgment::resulting_state)
    }

    /// Whether the record's latest decision is an acceptance
    pub fn has_accepted(&self, record_id: &str) -> bool {
        self.log
            .latest_for(record_id)
            .map_or(false, |entry| entry.accepted)
    }

    /// Record the method in force right before a switch into AI_FORECAST
    pub fn remember_previous_method(&mut self, record_id: &str, method: Method) {
        self.previous_methods.insert(record_id.to_string(), method);
    }

    /// Method to fall back to on rejection; MANUAL when nothing was remembered
    pub fn previous_method_or_manual(&self, record_id: &str) -> Method {
        self.previous_methods
            .get(record_id)
            .copied()
            .unwrap_or(Method::Manual)
    }

    /// Mark a review as open
    pub fn open_review(&mut self, record_id: &str) {
        self.pending.insert(record_id.to_string());
    }

    pub fn is_pending(&self, record_id: &str) -> bool {
        self.pending.contains(record_id)
    }

    pub fn pending_reviews(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Close the open review with a decision and append it to the log
    ///
    /// Returns `None` and writes nothing when the record has no open review.
    pub fn record_decision(
        &mut self,
        record_id: &str,
        user_id: &str,
        accepted: bool,
        reasoning: String,
        timestamp: DateTime<Utc>,
    ) -> Option<Acknowledgment> {
        if !self.pending.remove(record_id) {
            return None;
        }

        let entry = Acknowledgment {
            record_id: record_id.to_string(),
            user_id: user_id.to_string(),
            timestamp,
            accepted,
            previous_method: self.previous_method_or_manual(record_id),
            reasoning,
        };
        self.log.append(entry.clone());
        Some(entry)
    }

    /// Reopen reviews after a reload
    ///
    /// A record sitting in AI_FORECAST whose latest entry is not an acceptance
    /// was left mid-review.
    pub fn rebuild_pending<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = (&'a str, Method)>,
    {
        self.pending.clear();
        for (record_id, method) in records {
            if method.is_ai() && !self.has_accepted(record_id) {
                self.pending.insert(record_id.to_string());
            }
        }
    }

    /// Ask to leave the review of `record_id`
    pub fn request_close(&self, record_id: &str) -> ReviewExit {
        if self.is_pending(record_id) {
            ReviewExit::ConfirmationRequired {
                record_id: record_id.to_string(),
            }
        } else {
            ReviewExit::Closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide(store: &mut AcknowledgmentStore, id: &str, accepted: bool) -> Option<Acknowledgment> {
        store.record_decision(id, "pm-1", accepted, "curve fits schedule".to_string(), Utc::now())
    }

    #[test]
    fn test_state_follows_latest_entry() {
        let mut store = AcknowledgmentStore::new();
        assert_eq!(store.state("R-1"), ReviewState::None);

        store.open_review("R-1");
        assert_eq!(store.state("R-1"), ReviewState::Pending);
        decide(&mut store, "R-1", true).unwrap();
        assert_eq!(store.state("R-1"), ReviewState::Acknowledged);

        store.open_review("R-1");
        decide(&mut store, "R-1", false).unwrap();
        assert_eq!(store.state("R-1"), ReviewState::Rejected);
        assert_eq!(store.log().entries_for("R-1").count(), 2);
    }

    #[test]
    fn test_decision_without_open_review_writes_nothing() {
        let mut store = AcknowledgmentStore::new();
        assert!(decide(&mut store, "R-9", true).is_none());
        assert!(store.log().is_empty());
    }

    #[test]
    fn test_previous_method_defaults_to_manual() {
        let mut store = AcknowledgmentStore::new();
        assert_eq!(store.previous_method_or_manual("R-1"), Method::Manual);

        store.remember_previous_method("R-1", Method::BellCurve);
        store.open_review("R-1");
        let entry = decide(&mut store, "R-1", false).unwrap();
        assert_eq!(entry.previous_method, Method::BellCurve);
        // memo is read, never cleared
        assert_eq!(store.previous_method_or_manual("R-1"), Method::BellCurve);
    }

    #[test]
    fn test_close_is_blocked_while_pending() {
        let mut store = AcknowledgmentStore::new();
        assert_eq!(store.request_close("R-1"), ReviewExit::Closed);

        store.open_review("R-1");
        let exit = store.request_close("R-1");
        assert!(exit.is_blocked());
        assert_eq!(store.state("R-1"), ReviewState::Pending);
    }

    #[test]
    fn test_rebuild_pending_after_reload() {
        let mut store = AcknowledgmentStore::new();
        store.open_review("accepted");
        decide(&mut store, "accepted", true).unwrap();

        store.rebuild_pending([
            ("accepted", Method::AiForecast),
            ("fresh", Method::AiForecast),
            ("linear", Method::Linear),
        ]);

        assert_eq!(store.state("accepted"), ReviewState::Acknowledged);
        assert_eq!(store.state("fresh"), ReviewState::Pending);
        assert_eq!(store.state("linear"), ReviewState::None);
    }
}
