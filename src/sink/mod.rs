//! Sink pipeline: decides whether a write leaving the process carries owned
//! data and, if so, emits one JSON record for it.

pub mod dedup;
pub mod filters;
pub mod record;
pub mod stream;

use crate::email::{
    extract_emails, is_plausible_email, join_bounded, normalize_owners, OWNERS_CSV_MAX_BYTES,
};
use crate::host::{HostObject, Payload};
use crate::identity;
use crate::runtime::Runtime;
use crate::stats::{DropReason, StatEvent};
use dedup::DedupEntry;
use filters::{FILE_WRITE, SOCKET_SEND};
use record::{format_ts, SinkRecord};
use std::borrow::Cow;

/// Stand-in text when the host cannot stringify an object.
pub const REPR_ERROR: &str = "<repr-error>";

/// Event that made it through every filter, ready to be written.
struct Accepted {
    owners: Vec<String>,
    data: String,
    dest: String,
}

impl Runtime {
    /// Inspect an object reaching `sink` and log it when it carries an owner.
    ///
    /// `dest` names the file path or peer for file and socket sinks. Never
    /// fails: anything unexpected just means nothing is logged.
    pub fn log_if_sensitive(&self, sink: &str, obj: &dyn HostObject, dest: Option<&str>) {
        match self.evaluate_sink(sink, obj, dest.unwrap_or("")) {
            Ok(accepted) => self.emit(sink, &accepted),
            Err(reason) => {
                self.record(StatEvent::Dropped(reason));
                log::debug!("{sink}: dropped ({})", reason.as_str());
            }
        }
    }

    fn current_plausible_owner() -> Option<String> {
        identity::get().filter(|o| is_plausible_email(o))
    }

    fn evaluate_sink(
        &self,
        sink: &str,
        obj: &dyn HostObject,
        dest: &str,
    ) -> Result<Accepted, DropReason> {
        if !self.host.is_initialized() || self.host.error_pending() {
            return Err(DropReason::HostBusy);
        }

        let payload = obj.payload();
        if payload.raw().map_or(false, filters::is_trivial) {
            return Err(DropReason::Trivial);
        }

        // Labels recorded on the object itself.
        let mut owner = self.get_owner(obj.id());
        let table_tag = owner.is_some();

        // Addresses written into the content.
        let mut extracted: Vec<String> = Vec::new();
        if !table_tag {
            let view: Option<Cow<'_, str>> = match payload {
                Payload::Text(s) => Some(Cow::Borrowed(s)),
                Payload::Bytes(b) => Some(String::from_utf8_lossy(b)),
                Payload::Other => None,
            };
            if let Some(view) = view {
                extracted = extract_emails(&view);
            }
            if !extracted.is_empty() {
                owner = Some(extracted.join(","));
            }
        }

        let mut data = match payload {
            Payload::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            _ => obj.repr().unwrap_or_else(|| REPR_ERROR.to_string()),
        };
        let binary = filters::looks_binary(payload.raw().unwrap_or(data.as_bytes()));

        if owner.is_none() {
            let consult_thread = match sink {
                FILE_WRITE | SOCKET_SEND => {
                    table_tag || data.contains('@') || filters::has_digit(&data)
                }
                _ => table_tag,
            };
            if consult_thread {
                owner = Self::current_plausible_owner();
            }
        }
        // File writes get one more chance at an owner below.
        if owner.is_none() && sink != FILE_WRITE {
            return Err(DropReason::NoOwner);
        }

        if sink == SOCKET_SEND {
            if filters::is_framework_noise(&data) {
                return Err(DropReason::FrameworkNoise);
            }
            let line_end = filters::first_line(&data).len();
            data.truncate(line_end);
        }
        if filters::is_console(sink) {
            if !extracted.is_empty() {
                data = extracted.join(",");
            }
        }

        // Encrypted socket traffic is kept as evidence.
        if binary && !(sink == SOCKET_SEND && owner.is_some()) {
            return Err(DropReason::Binary);
        }

        if sink == FILE_WRITE {
            if dest.is_empty() {
                return Err(DropReason::FilePolicy);
            }
            if owner.is_none() {
                owner = Self::current_plausible_owner().or_else(|| {
                    self.last_primary_owner()
                        .filter(|o| is_plausible_email(o))
                });
            }
            if owner.is_none() {
                return Err(DropReason::NoOwner);
            }
            if !filters::file_write_is_sensitive(&data, table_tag, &extracted) {
                return Err(DropReason::FilePolicy);
            }
        }

        let owner = owner.ok_or(DropReason::NoOwner)?;
        let normalized = normalize_owners(&owner);
        let owners_csv = join_bounded(&normalized, OWNERS_CSV_MAX_BYTES);
        if owners_csv.is_empty() {
            return Err(DropReason::NoValidOwner);
        }
        let owners: Vec<String> = owners_csv.split(',').map(str::to_string).collect();

        // The first owner becomes the identity for the writes that follow.
        identity::set(&owners[0]);
        let mut state = self.sink_state();
        state.last_primary_owner = Some(owners[0].clone());

        let entry = DedupEntry::new(filters::sink_group(sink), sink, &owners_csv, &data, dest);
        if state.dedup.is_duplicate(&entry) {
            return Err(DropReason::Duplicate);
        }
        if sink == FILE_WRITE {
            if let Some(previous) = state.dedup.last() {
                if previous.sink == FILE_WRITE
                    && previous.dest == dest
                    && previous.owners == owners_csv
                    && filters::is_filler_extension(&previous.data, &data)
                {
                    return Err(DropReason::Superset);
                }
            }
        }
        state.dedup.remember(entry);

        Ok(Accepted {
            owners,
            data,
            dest: dest.to_string(),
        })
    }

    fn emit(&self, sink: &str, accepted: &Accepted) {
        let record = SinkRecord {
            sink,
            ts: format_ts(chrono::Utc::now()),
            source: self.source_label(),
            pid: self.host.pid(),
            dest: &accepted.dest,
            owners: &accepted.owners,
            data: &accepted.data,
        };
        match record.to_bytes() {
            Ok(bytes) => {
                if self.stream.write_record(&bytes) {
                    self.record(StatEvent::RecordEmitted);
                }
            }
            Err(e) => log::debug!("{sink}: cannot encode record: {e}"),
        }
    }
}
