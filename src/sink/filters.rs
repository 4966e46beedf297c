//! Payload predicates used by the sink pipeline.

pub const STDOUT: &str = "stdout";
pub const STDERR: &str = "stderr";
pub const FILE_WRITE: &str = "file_write";
pub const SOCKET_SEND: &str = "socket_send";

const CONSOLE_GROUP: &str = "console";

/// Prefixes of HTTP responses, HTML pages and bundled scripts.
const FRAMEWORK_NOISE: &[&str] = &["HTTP/1.", "<!DOCTYPE", "/*"];

/// Printable share below which a payload counts as binary, in tenths.
const MIN_PRINTABLE_TENTHS: usize = 7;

fn is_blank_byte(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n')
}

/// Single characters and pure whitespace are never worth a record.
pub fn is_trivial(raw: &[u8]) -> bool {
    raw.len() <= 1 || raw.iter().all(|&b| is_blank_byte(b))
}

/// Dedup equivalence class: console sinks share one group.
pub fn sink_group(sink: &str) -> &str {
    match sink {
        STDOUT | STDERR | FILE_WRITE => CONSOLE_GROUP,
        other => other,
    }
}

pub fn is_console(sink: &str) -> bool {
    matches!(sink, STDOUT | STDERR)
}

pub fn is_framework_noise(data: &str) -> bool {
    FRAMEWORK_NOISE.iter().any(|prefix| data.starts_with(prefix))
}

/// Everything before the first CR or LF.
pub fn first_line(data: &str) -> &str {
    match data.find(['\r', '\n']) {
        Some(end) => &data[..end],
        None => data,
    }
}

fn is_printable(b: u8) -> bool {
    matches!(b, b'\n' | b'\r' | b'\t' | 0x20..=0x7e)
}

/// True when fewer than 70% of the bytes are printable ASCII.
pub fn looks_binary(raw: &[u8]) -> bool {
    if raw.is_empty() {
        return false;
    }
    let printable = raw.iter().filter(|&&b| is_printable(b)).count();
    printable * 10 < raw.len() * MIN_PRINTABLE_TENTHS
}

pub fn has_digit(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_digit())
}

/// File writes are only logged when the content could carry identity:
/// an address, a number, a labelled object or extracted emails.
pub fn file_write_is_sensitive(data: &str, table_tag: bool, extracted: &[String]) -> bool {
    if data.trim().is_empty() {
        return false;
    }
    data.contains('@') || has_digit(data) || table_tag || !extracted.is_empty()
}

/// A write that repeats `previous` and only appends filler text.
///
/// Matches when `current` strictly extends `previous` and the extension,
/// after its leading whitespace, contains neither a digit nor `@`.
pub fn is_filler_extension(previous: &str, current: &str) -> bool {
    if current.len() <= previous.len() {
        return false;
    }
    let Some(extension) = current.strip_prefix(previous) else {
        return false;
    };
    let extension = extension.trim_start();
    !extension.contains('@') && !has_digit(extension)
}
