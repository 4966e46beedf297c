//! Per-thread "current owner": the identity assumed when a tag has no
//! explicit owner.

use crate::email::{truncate_bytes, OWNER_MAX_BYTES};
use std::cell::RefCell;

thread_local! {
    static CURRENT_OWNER: RefCell<String> = RefCell::new(String::new());
}

/// Set the owner for this thread. An empty string clears it.
pub fn set(owner: &str) {
    CURRENT_OWNER.with(|cur| {
        let mut cur = cur.borrow_mut();
        cur.clear();
        cur.push_str(truncate_bytes(owner, OWNER_MAX_BYTES));
    });
}

pub fn get() -> Option<String> {
    CURRENT_OWNER.with(|cur| {
        let cur = cur.borrow();
        if cur.is_empty() {
            None
        } else {
            Some(cur.clone())
        }
    })
}

pub fn clear() {
    CURRENT_OWNER.with(|cur| cur.borrow_mut().clear());
}
