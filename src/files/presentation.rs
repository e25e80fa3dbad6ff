//! Table model for a list of license files.
//!
//! Everything here is pure: the derived columns are computed from the
//! filename and file number alone, and the delete action is gated on the
//! viewer's [`Role`]. Fetching bytes and saving them lives in
//! [`crate::client`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use time::{macros::format_description, OffsetDateTime};
use uuid::Uuid;

use super::dto::FileRecord;
use crate::auth::role::{can, Capability, Role};

pub const DISPLAY_PREFIX: &str = "LIC/TL/CAN";
pub const NOT_AVAILABLE: &str = "N/A";
pub const HEADERS: [&str; 5] = ["File Path", "File Name", "File Type", "Uploaded Date", "Manage"];

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    // last dot plus a segment with no further dot or slash, at end of input
    static ref TRAILING_EXT: Regex = Regex::new(r"\.[^/.]+$").unwrap();
}

/// Replaces every run of whitespace with a single underscore.
pub fn format_path(path: &str) -> String {
    WHITESPACE_RUN.replace_all(path, "_").into_owned()
}

/// Underscores become spaces, then a trailing `.ext` is dropped.
pub fn clean_name(filename: &str) -> String {
    let spaced = filename.replace('_', " ");
    TRAILING_EXT.replace(&spaced, "").into_owned()
}

/// Upper-cased text after the last dot, or [`NOT_AVAILABLE`].
pub fn extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_uppercase(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn display_path(filename: &str, file_number: &str) -> String {
    format!(
        "{}/{}/{}",
        DISPLAY_PREFIX,
        format_path(&clean_name(filename)),
        file_number
    )
}

/// `M/D/YYYY, h:mm:ss AM` in the timestamp's own offset.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    let fmt = format_description!(
        "[month padding:none]/[day padding:none]/[year], [hour repr:12 padding:none]:[minute]:[second] [period]"
    );
    ts.format(fmt).unwrap_or_else(|_| ts.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shade {
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Delete,
    Download,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub key: Uuid,
    pub filename: String,
    pub shade: Shade,
    pub display_path: String,
    pub name: String,
    pub file_type: String,
    pub uploaded: String,
    pub actions: Vec<Action>,
}

impl TableRow {
    fn build(index: usize, record: &FileRecord, actions: &[Action]) -> Self {
        Self {
            key: record.file_id,
            filename: record.filename.clone(),
            shade: if index % 2 == 0 { Shade::Even } else { Shade::Odd },
            display_path: display_path(&record.filename, &record.file_number),
            name: clean_name(&record.filename),
            file_type: extension(&record.filename),
            uploaded: format_timestamp(record.last_modified),
            actions: actions.to_vec(),
        }
    }
}

/// Rows for a file listing as seen by one viewer.
#[derive(Debug, Clone, Serialize)]
pub struct FileTable {
    pub headers: [&'static str; 5],
    pub rows: Vec<TableRow>,
    #[serde(skip)]
    viewer: Option<Role>,
}

impl FileTable {
    pub fn build(records: &[FileRecord], viewer: Option<Role>) -> Self {
        let mut actions = Vec::with_capacity(2);
        if can(viewer, Capability::Delete) {
            actions.push(Action::Delete);
        }
        actions.push(Action::Download);

        let rows = records
            .iter()
            .enumerate()
            .map(|(i, rec)| TableRow::build(i, rec, &actions))
            .collect();
        Self {
            headers: HEADERS,
            rows,
            viewer,
        }
    }

    pub fn can_delete(&self) -> bool {
        can(self.viewer, Capability::Delete)
    }

    /// Hands `filename` to `on_delete` when the viewer may delete.
    /// Returns whether the callback ran.
    pub fn delete<F>(&self, filename: &str, on_delete: F) -> bool
    where
        F: FnOnce(&str),
    {
        if !self.can_delete() {
            return false;
        }
        on_delete(filename);
        true
    }
}
