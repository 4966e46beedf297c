use crate::config::RuntimeConfig;
use crate::host::{HostEnv, NativeHost};
use crate::label_store::LabelStore;
use crate::sink::dedup::DedupMemory;
use crate::sink::stream::LogStream;
use crate::source::resolve_source;
use crate::stats::{StatEvent, StatisticsCollector, StatsSnapshot};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Sink-side memory shared by every thread.
#[derive(Debug)]
pub(crate) struct SinkState {
    pub dedup: DedupMemory,
    /// First owner of the most recent record, kept after thread owners clear.
    pub last_primary_owner: Option<String>,
}

/// Everything the provenance engine keeps for one host process.
///
/// Instrumentation points call the tagging, propagation and sink methods on a
/// shared `&Runtime`; all of them are safe to call from any thread and none of
/// them fail.
pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) host: Box<dyn HostEnv>,
    pub(crate) store: LabelStore,
    pub(crate) stream: LogStream,
    pub(crate) sink_state: Mutex<SinkState>,
    source: OnceLock<String>,
    stats: StatisticsCollector,
    stats_reported: AtomicBool,
}

impl Runtime {
    pub fn new(config: RuntimeConfig, host: Box<dyn HostEnv>) -> Self {
        let stream = LogStream::new(config.log_path.clone());
        Self::with_stream(config, host, stream)
    }

    /// Send records to `writer` instead of the configured log.
    pub fn with_writer(
        config: RuntimeConfig,
        host: Box<dyn HostEnv>,
        writer: Box<dyn Write + Send>,
    ) -> Self {
        Self::with_stream(config, host, LogStream::with_writer(writer))
    }

    /// Runtime for the current process, configured from its environment.
    pub fn from_env() -> Self {
        let config = RuntimeConfig::from_env(&NativeHost);
        Self::new(config, Box::new(NativeHost))
    }

    fn with_stream(config: RuntimeConfig, host: Box<dyn HostEnv>, stream: LogStream) -> Self {
        log::debug!(
            "provenance runtime: {} slots, log {:?}",
            config.table_capacity,
            stream.path()
        );
        Self {
            store: LabelStore::with_capacity(config.table_capacity),
            sink_state: Mutex::new(SinkState {
                dedup: DedupMemory::new(config.dedup_window),
                last_primary_owner: None,
            }),
            source: OnceLock::new(),
            stats: StatisticsCollector::new(),
            stats_reported: AtomicBool::new(false),
            config,
            host,
            stream,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn label_store(&self) -> &LabelStore {
        &self.store
    }

    /// Program label stamped on every record, resolved once.
    pub fn source_label(&self) -> &str {
        self.source
            .get_or_init(|| resolve_source(self.config.source.as_deref(), self.host.as_ref()))
    }

    pub fn last_primary_owner(&self) -> Option<String> {
        self.sink_state().last_primary_owner.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.store.saturation_misses())
    }

    /// Log the current counters and warn if the label store ever saturated.
    ///
    /// Runs at most once per runtime; teardown skips the report when it has
    /// already been made.
    pub fn report_stats(&self) -> StatsSnapshot {
        let snapshot = self.stats();
        if self.stats_reported.swap(true, Ordering::AcqRel) {
            return snapshot;
        }
        match serde_json::to_string(&snapshot) {
            Ok(json) => log::info!("provenance runtime stats: {json}"),
            Err(e) => log::warn!("Failed to serialize provenance stats: {e}"),
        }
        if snapshot.saturation_misses > 0 {
            log::warn!(
                "label store saturated {} times; raise table_capacity above {}",
                snapshot.saturation_misses,
                self.store.capacity()
            );
        }
        snapshot
    }

    #[cfg(test)]
    pub(crate) fn stats_reported(&self) -> bool {
        self.stats_reported.load(Ordering::Acquire)
    }

    pub(crate) fn record(&self, event: StatEvent) {
        self.stats.record_event(event);
    }

    pub(crate) fn sink_state(&self) -> MutexGuard<'_, SinkState> {
        match self.sink_state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.config.report_stats_on_drop {
            self.report_stats();
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("stream", &self.stream)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Runtime;
    use crate::config::test_support::FakeHost;
    use crate::config::RuntimeConfig;
    use crate::sink::stream::test_support::SharedBuffer;

    pub fn runtime_with_buffer(host: FakeHost) -> (Runtime, SharedBuffer) {
        let config = RuntimeConfig {
            table_capacity: 1024,
            report_stats_on_drop: false,
            ..Default::default()
        };
        let buffer = SharedBuffer::default();
        let runtime = Runtime::with_writer(config, Box::new(host), Box::new(buffer.clone()));
        (runtime, buffer)
    }

    pub fn records(buffer: &SharedBuffer) -> Vec<serde_json::Value> {
        serde_json::Deserializer::from_str(&buffer.contents())
            .into_iter::<serde_json::Value>()
            .map(|v| v.unwrap())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::runtime_with_buffer;
    use crate::config::test_support::FakeHost;
    use crate::host::ObjectId;

    #[test]
    fn test_source_label_resolved_from_host() {
        let host = FakeHost::default().with_argv(&["python3", "/srv/app/login.py"]);
        let (runtime, _) = runtime_with_buffer(host);
        assert_eq!(runtime.source_label(), "login.py");
    }

    #[test]
    fn test_config_source_overrides_argv() {
        let host = FakeHost::default().with_argv(&["python3", "/srv/app/login.py"]);
        let (mut runtime, _) = runtime_with_buffer(host);
        runtime.config.source = Some("billing".to_string());
        assert_eq!(runtime.source_label(), "billing");
    }

    #[test]
    fn test_stats_include_saturation() {
        let (runtime, _) = runtime_with_buffer(FakeHost::default());
        assert_eq!(runtime.stats().saturation_misses, 0);
        assert_eq!(runtime.label_store().capacity(), 1024);
        assert!(!runtime.get(ObjectId::from_addr(0x10).unwrap()));
        assert!(runtime.last_primary_owner().is_none());
    }

    #[test]
    fn test_report_stats_runs_once() {
        let (runtime, _) = runtime_with_buffer(FakeHost::default());
        let obj = ObjectId::from_addr(0x10).unwrap();
        runtime.tag_owned(obj, Some("alice@example.com"));
        assert!(!runtime.stats_reported());

        let first = runtime.report_stats();
        assert_eq!(first.tags_applied, 1);
        assert!(runtime.stats_reported());

        runtime.tag_owned(obj, Some("bob@example.com"));
        assert_eq!(runtime.report_stats().tags_applied, 2);
        assert!(runtime.stats_reported());
    }
}
