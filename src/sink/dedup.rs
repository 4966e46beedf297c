use std::collections::VecDeque;

/// 64-bit FNV-1a.
pub fn hash64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |h, &b| (h ^ u64::from(b)).wrapping_mul(PRIME))
}

/// Fingerprint of an emitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupEntry {
    pub group: String,
    pub sink: String,
    pub owners: String,
    pub data: String,
    pub dest: String,
    pub signature: u64,
}

impl DedupEntry {
    pub fn new(group: &str, sink: &str, owners: &str, data: &str, dest: &str) -> Self {
        let signature = hash64(data.as_bytes())
            ^ (hash64(owners.as_bytes()) << 1)
            ^ (hash64(dest.as_bytes()) << 2);
        Self {
            group: group.to_string(),
            sink: sink.to_string(),
            owners: owners.to_string(),
            data: data.to_string(),
            dest: dest.to_string(),
            signature,
        }
    }
}

/// The last `window` emitted events, newest first.
#[derive(Debug)]
pub struct DedupMemory {
    window: usize,
    recent: VecDeque<DedupEntry>,
}

impl DedupMemory {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            recent: VecDeque::with_capacity(window),
        }
    }

    pub fn is_duplicate(&self, entry: &DedupEntry) -> bool {
        self.recent
            .iter()
            .any(|seen| seen.signature == entry.signature && seen == entry)
    }

    pub fn last(&self) -> Option<&DedupEntry> {
        self.recent.front()
    }

    pub fn remember(&mut self, entry: DedupEntry) {
        if self.recent.len() == self.window {
            self.recent.pop_back();
        }
        self.recent.push_front(entry);
    }
}
