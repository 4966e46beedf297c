/// Owner strings are stored in 128-byte slots including a terminator.
pub const OWNER_MAX_BYTES: usize = 127;

/// Upper bound on the normalized owner list.
pub const OWNERS_CSV_MAX_BYTES: usize = 255;

/// At most this many distinct owners survive normalization.
pub const MAX_OWNERS: usize = 8;

const LEFT_DELIMITERS: &[u8] = b" \n\t,:";
const RIGHT_DELIMITERS: &[u8] = b" \n\t,>";

/// Identity strings the host uses when it has no real owner.
const JUNK_OWNERS: &[&str] = &["<unknown>", "@:"];

/// Cheap "looks like an email" check used everywhere an owner is accepted.
///
/// `@` must appear after position 0 and a `.` must follow it with at least one
/// more character after the dot. Lists (anything with a comma) are rejected.
pub fn is_plausible_email(s: &str) -> bool {
    if s.is_empty() || JUNK_OWNERS.contains(&s) || s.contains(',') {
        return false;
    }
    let at = match s.find('@') {
        Some(0) | None => return false,
        Some(at) => at,
    };
    let domain = &s.as_bytes()[at + 1..];
    domain
        .iter()
        .enumerate()
        .any(|(i, &b)| b == b'.' && i + 1 < domain.len())
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Join whole elements with commas, skipping any that would exceed `max`.
pub fn join_bounded<S: AsRef<str>>(items: &[S], max: usize) -> String {
    let mut out = String::new();
    for item in items {
        let item = item.as_ref();
        let extra = if out.is_empty() { item.len() } else { item.len() + 1 };
        if out.len() + extra > max {
            break;
        }
        if !out.is_empty() {
            out.push(',');
        }
        out.push_str(item);
    }
    out
}

/// Characters an unquoted local part may hold (RFC 5322 atext plus `.`).
fn is_local_part_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b".!#$%&'*+-/=?^_`{|}~".contains(&b) || b >= 0x80
}

/// Opening punctuation that wraps an address rather than belonging to it.
fn is_opening_byte(b: u8) -> bool {
    matches!(b, b'\'' | b'"' | b'<' | b'(' | b'[')
}

/// Start of the local part inside `window`, which ends just before the `@`.
fn local_part_start(window: &[u8]) -> usize {
    let mut start = window
        .iter()
        .rposition(|&b| !is_local_part_byte(b))
        .map_or(0, |p| p + 1);
    // A quoted assignment such as `email='...` starts after the quote.
    if let Some(p) = window[start..]
        .windows(2)
        .rposition(|w| w[0] == b'=' && matches!(w[1], b'\'' | b'"'))
    {
        start += p + 2;
    }
    while start < window.len() && is_opening_byte(window[start]) {
        start += 1;
    }
    start
}

fn is_domain_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'.' || b == b'-' || b >= 0x80
}

/// Scan `text` for embedded addresses.
///
/// Each `@` is widened to the surrounding run of non-delimiter bytes, then
/// narrowed to the characters an address can hold, and the candidate is kept
/// only if it is plausible. Results keep first-seen order without repeats.
pub fn extract_emails(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut found: Vec<String> = Vec::new();
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'@') {
        let at = pos + offset;

        let mut start = at;
        while start > 0 && !LEFT_DELIMITERS.contains(&bytes[start - 1]) {
            start -= 1;
        }
        let mut stop = at;
        while stop < bytes.len() && !RIGHT_DELIMITERS.contains(&bytes[stop]) {
            stop += 1;
        }

        // Keep only the address itself: the local part without its opening
        // punctuation and the domain run, minus a trailing dot or hyphen.
        start += local_part_start(&bytes[start..at]);
        if let Some(p) = bytes[at + 1..stop].iter().position(|&b| !is_domain_byte(b)) {
            stop = at + 1 + p;
        }
        while stop > at + 1 && matches!(bytes[stop - 1], b'.' | b'-') {
            stop -= 1;
        }

        let candidate = String::from_utf8_lossy(&bytes[start..stop]);
        let candidate = truncate_bytes(&candidate, OWNER_MAX_BYTES);
        if is_plausible_email(candidate) && !found.iter().any(|f| f == candidate) {
            found.push(candidate.to_string());
        }

        pos = (at + 1).max(stop);
        if pos >= bytes.len() {
            break;
        }
    }

    found
}

/// Strip whitespace, wrapping `<>`, quotes and trailing commas from one entry.
fn clean_owner(raw: &str) -> &str {
    raw.trim()
        .trim_end_matches(',')
        .trim_matches(|c: char| matches!(c, '<' | '>' | '\'' | '"') || c.is_whitespace())
}

/// Normalize a comma-separated owner list into at most eight plausible,
/// distinct addresses in input order.
pub fn normalize_owners(csv: &str) -> Vec<String> {
    let mut owners: Vec<String> = Vec::new();
    for raw in csv.split(',') {
        let owner = clean_owner(raw);
        if !is_plausible_email(owner) || owners.iter().any(|o| o == owner) {
            continue;
        }
        owners.push(owner.to_string());
        if owners.len() == MAX_OWNERS {
            break;
        }
    }
    owners
}
