pub mod binding;
pub mod config;
pub mod email;
pub mod host;
pub mod identity;
pub mod label_store;
pub mod log_reader;
pub mod runtime;
pub mod sink;
pub mod source;
pub mod stats;
pub mod tagger;

pub use config::RuntimeConfig;
pub use host::{HostEnv, HostObject, HostValue, NativeHost, ObjectId, Payload};
pub use log_reader::{EventFilter, ProvEvent, ProvRecord};
pub use runtime::Runtime;
pub use stats::{DropReason, StatsSnapshot};
