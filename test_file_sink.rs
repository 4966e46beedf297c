use prov_runtime::host::{HostObject, HostValue, NativeHost};
use prov_runtime::{identity, Runtime, RuntimeConfig};

fn main() {
    let dir = std::env::temp_dir();
    let log_path = dir.join("prov-file-sink.log");
    let ledger = dir.join("ledger.txt");
    let ledger = ledger.to_string_lossy();

    let config = RuntimeConfig {
        log_path: Some(log_path.clone()),
        source: Some("test_file_sink".to_string()),
        report_stats_on_drop: false,
        ..Default::default()
    };
    let rt = Runtime::new(config, Box::new(NativeHost));

    identity::set("alice@example.com");
    let balance = HostValue::text("balance=1200");
    rt.tag(balance.id());
    rt.log_if_sensitive("file_write", &balance, Some(&ledger));

    // Owner cleared: the last primary owner still attributes the write.
    identity::clear();
    rt.log_if_sensitive("file_write", &HostValue::text("balance=1300"), Some(&ledger));

    // Filler content with no digits is not worth a record.
    rt.log_if_sensitive("file_write", &HostValue::text("hello world"), Some(&ledger));

    println!("records written to {}", log_path.display());
    println!("last primary owner: {:?}", rt.last_primary_owner());
    println!("{:#?}", rt.stats());
}
