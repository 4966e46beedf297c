use clap::{Arg, Command};
use log::LevelFilter;
use prov_runtime::config::{RuntimeConfig, ENV_LOG_JSON};
use prov_runtime::host::{HostObject, HostValue, NativeHost};
use prov_runtime::log_reader::{self, EventFilter, ProvEvent};
use prov_runtime::{identity, Runtime};
use std::path::PathBuf;
use std::process;

const DEFAULT_LOG: &str = "prov.log";

fn main() {
    let matches = Command::new("prov-runtime")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect provenance logs written by the data-owner tracking runtime")
        .arg(
            Arg::new("log")
                .short('l')
                .long("log")
                .value_name("FILE")
                .help("Provenance log to read (default: $PY_PROVENANCE_LOG_JSON or prov.log)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("owner")
                .short('o')
                .long("owner")
                .value_name("EMAIL")
                .help("Only show events owned by this address")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("match")
                .short('m')
                .long("match")
                .value_name("REGEX")
                .help("Only show events whose data matches this pattern")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("summary")
                .long("summary")
                .help("Show per-owner counts per channel instead of events")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print output as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .help("Run a scripted tracking session and print its statistics")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Runtime configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config = match matches.get_one::<String>("config") {
        Some(path) => match RuntimeConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration: {e:#}");
                process::exit(1);
            }
        },
        None => RuntimeConfig::from_env(&NativeHost),
    };

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    let log_path = resolve_log_path(matches.get_one::<String>("log"), &config);

    if matches.get_flag("demo") {
        run_demo(config, log_path.clone());
    }

    let filter = match EventFilter::new(
        matches.get_one::<String>("owner").map(String::as_str),
        matches.get_one::<String>("match").map(String::as_str),
    ) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };

    let records = match log_reader::parse_log_file(&log_path) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };
    let events = filter.apply(log_reader::enrich(records));
    let json = matches.get_flag("json");

    if matches.get_flag("summary") {
        let summary = log_reader::summarize(&events);
        if json {
            print_json(&summary);
        } else {
            print_summary(&summary);
        }
    } else if json {
        print_json(&events);
    } else {
        print_events(&events, &log_path);
    }
}

fn resolve_log_path(explicit: Option<&String>, config: &RuntimeConfig) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }
    if let Some(path) = &config.log_path {
        return path.clone();
    }
    std::env::var(ENV_LOG_JSON)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG))
}

fn generate_default_config(path: &str) {
    let config = RuntimeConfig::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Point PY_PROVENANCE_CONFIG at it to use it from a host process.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e:#}");
            process::exit(1);
        }
    }
}

fn test_config(config: &RuntimeConfig) {
    println!("🔍 Testing configuration...");
    println!();
    match config.validate() {
        Ok(()) => {
            println!("Label table capacity: {}", config.table_capacity.max(2).next_power_of_two());
            match &config.log_path {
                Some(path) => println!("Log path: {}", path.display()),
                None => println!("Log path: stderr"),
            }
            println!("Source label: {}", config.source.as_deref().unwrap_or("(from argv)"));
            println!("Dedup window: {}", config.dedup_window);
            println!("✅ Configuration is valid");
        }
        Err(e) => {
            println!("❌ Configuration validation failed:");
            println!("Error: {e:#}");
            process::exit(1);
        }
    }
}

/// A short session: a user logs in, their record is tagged, a derived value
/// inherits the label, and both leave the process through sinks.
fn run_demo(mut config: RuntimeConfig, log_path: PathBuf) {
    println!("🧪 Running provenance demo, writing to {}", log_path.display());
    config.log_path = Some(log_path);
    config.report_stats_on_drop = false;
    if config.source.is_none() {
        config.source = Some("prov-demo".to_string());
    }
    let runtime = Runtime::new(config, Box::new(NativeHost));

    identity::set("alice@example.com");
    let email = HostValue::text("alice@example.com");
    runtime.tag(email.id());

    let age = HostValue::text("42");
    runtime.tag_owned(age.id(), Some("alice@example.com"));
    let next_age = HostValue::text("43");
    runtime.propagate(next_age.id(), Some(age.id()), None);

    let partner = HostValue::text("bob@example.com");
    runtime.tag_owned(partner.id(), Some("bob@example.com"));
    let pair = HostValue::text("alice@example.com & bob@example.com");
    runtime.propagate(pair.id(), Some(email.id()), Some(partner.id()));

    runtime.log_if_sensitive("stdout", &email, None);
    runtime.log_if_sensitive("stdout", &next_age, None);
    runtime.log_if_sensitive("file_write", &pair, Some("/tmp/prov-demo-ledger.txt"));
    runtime.log_if_sensitive("stdout", &HostValue::text("no owner here"), None);
    identity::clear();

    println!();
    print_json(&runtime.stats());
    println!();
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

fn print_events(events: &[ProvEvent], log_path: &std::path::Path) {
    if events.is_empty() {
        println!("No provenance events in {}", log_path.display());
        return;
    }
    println!("📊 Provenance events ({} total)", events.len());
    println!("═══════════════════════════════════════");
    for event in events {
        let record = &event.record;
        println!("{}  {:<18} {}", record.ts, event.channel, event.owners_str);
        if let Some(dest) = &record.dest {
            println!("    dest: {dest}");
        }
        println!("    data: {}", truncate_string(&record.data.replace('\n', " "), 100));
    }
}

fn print_summary(summary: &log_reader::LogSummary) {
    println!("📊 Provenance Summary");
    println!("═══════════════════════════════════════");
    println!("  Total Events: {}", summary.total_events);
    for (channel, count) in &summary.by_channel {
        println!("  {channel}: {count}");
    }
    println!();
    for (owner, stats) in &summary.owners {
        println!("👤 {owner} ({} events, last {})", stats.total, stats.last_seen);
        for (channel, count) in &stats.by_channel {
            println!("    {channel}: {count}");
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing output: {e}");
            process::exit(1);
        }
    }
}
