//! Search semantics shared by every record store.
//!
//! A query matches a record when its trimmed text occurs, ignoring case, in
//! the subject, sender, recipient or registry number. The status filter and
//! the optional date range narrow the result further. Stores that push the
//! query down to a database must produce the same set and order as
//! [`SearchQuery::apply`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::correspondence::CorrespondenceRecord;
use crate::correspondence_status::CorrespondenceStatus;

/// Restricts results to one status, or lets every status through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    All,
    Only(CorrespondenceStatus),
}

impl StatusFilter {
    pub fn admits(&self, status: CorrespondenceStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => *wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    /// `all`, `all status` and the empty string mean no filtering.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("all")
            || trimmed.eq_ignore_ascii_case("all status")
        {
            return Ok(Self::All);
        }
        trimmed
            .parse::<CorrespondenceStatus>()
            .map(Self::Only)
            .map_err(|e| e.to_string())
    }
}

/// Result ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Creation time, most recent first.
    #[default]
    Newest,
    /// Creation time, oldest first.
    Oldest,
    /// Subject, ascending.
    Subject,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Subject => "subject",
        }
    }

    /// Total order used to sort records. Ties fall back to the id so that
    /// repeated searches return the same order.
    pub fn compare(&self, a: &CorrespondenceRecord, b: &CorrespondenceRecord) -> Ordering {
        let primary = match self {
            Self::Newest => b.created_at.cmp(&a.created_at),
            Self::Oldest => a.created_at.cmp(&b.created_at),
            Self::Subject => a
                .subject
                .cmp(&b.subject)
                .then_with(|| b.created_at.cmp(&a.created_at)),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "subject" => Ok(Self::Subject),
            other => Err(format!(
                "Invalid sort '{other}'. Valid values: newest, oldest, subject"
            )),
        }
    }
}

/// A complete search request against the record store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub status: StatusFilter,
    pub sort: SortKey,
    /// Inclusive lower bound on the record date.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the record date.
    pub date_to: Option<NaiveDate>,
}

impl SearchQuery {
    pub fn new(text: Option<String>, status: StatusFilter, sort: SortKey) -> Self {
        Self {
            text,
            status,
            sort,
            ..Default::default()
        }
    }

    /// Lower-cased search needle, or `None` when the query text is blank.
    pub fn needle(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, record: &CorrespondenceRecord) -> bool {
        if !self.status.admits(record.status) {
            return false;
        }
        if let Some(from) = self.date_from
            && record.date < from
        {
            return false;
        }
        if let Some(to) = self.date_to
            && record.date > to
        {
            return false;
        }
        match self.needle() {
            None => true,
            Some(needle) => [
                &record.subject,
                &record.sender,
                &record.recipient,
                &record.registry_number,
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle)),
        }
    }

    /// Filter and sort records in memory.
    pub fn apply<'a, I>(&self, records: I) -> Vec<CorrespondenceRecord>
    where
        I: IntoIterator<Item = &'a CorrespondenceRecord>,
    {
        let mut out: Vec<CorrespondenceRecord> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();
        out.sort_by(|a, b| self.sort.compare(a, b));
        out
    }
}
