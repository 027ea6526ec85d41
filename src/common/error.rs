use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::sys::browser::{Api, HostError};
use crate::sys::storage::StorageError;

static NOT_FOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^No (tab|group|window) with id:? ?(-?\d+)").unwrap());

static HOST_BUSY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcannot be edited right now\b").unwrap());

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no {what} with id {id}")]
    NotFound { what: &'static str, id: i64 },

    /// The browser refuses tab edits while the user is interacting with the
    /// tab strip, e.g. mid-drag.
    #[error("browser is busy: {0}")]
    HostBusy(String),

    #[error("`{call}` did not answer within {after:?}")]
    Timeout { call: Api, after: Duration },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("browser call failed: {0}")]
    Unclassified(String),

    #[error("tab service is not running")]
    ServiceStopped,
}

impl Error {
    pub fn is_not_found(&self) -> bool { matches!(self, Error::NotFound { .. }) }

    pub fn is_host_busy(&self) -> bool { matches!(self, Error::HostBusy(_)) }
}

impl From<HostError> for Error {
    fn from(err: HostError) -> Self {
        let HostError { message } = err;
        if let Some(caps) = NOT_FOUND.captures(&message) {
            let what = match &caps[1] {
                "tab" => "tab",
                "group" => "group",
                _ => "window",
            };
            if let Ok(id) = caps[2].parse() {
                return Error::NotFound { what, id };
            }
        }
        if HOST_BUSY.is_match(&message) {
            return Error::HostBusy(message);
        }
        Error::Unclassified(message)
    }
}
