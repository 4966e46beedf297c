//! Labelling objects with owners and carrying labels to derived values.

use crate::email::{is_plausible_email, join_bounded, OWNER_MAX_BYTES};
use crate::host::ObjectId;
use crate::identity;
use crate::runtime::Runtime;
use crate::stats::StatEvent;

impl Runtime {
    /// Tag `obj` with the thread's current owner, if there is one.
    pub fn tag(&self, obj: ObjectId) {
        self.tag_owned(obj, None);
    }

    /// Tag `obj` with `owner`, or with the current owner when `owner` is empty.
    ///
    /// Only plausible email addresses are accepted. A successful tag also
    /// makes the owner current for this thread.
    pub fn tag_owned(&self, obj: ObjectId, owner: Option<&str>) {
        let effective = match owner.filter(|o| !o.is_empty()) {
            Some(owner) => owner.to_string(),
            None => match identity::get() {
                Some(current) => current,
                None => return,
            },
        };

        if !is_plausible_email(&effective) {
            self.record(StatEvent::TagRefused);
            log::debug!("refusing implausible owner {effective:?}");
            return;
        }
        self.apply_owner(obj, &effective, &effective);
    }

    fn apply_owner(&self, obj: ObjectId, stored: &str, primary: &str) -> bool {
        let Some(slot) = self.store.lookup(obj, true) else {
            return false;
        };
        slot.set(stored);
        identity::set(primary);
        self.record(StatEvent::TagApplied);
        true
    }

    pub fn get(&self, obj: ObjectId) -> bool {
        self.store
            .lookup(obj, false)
            .map_or(false, |slot| slot.is_tagged())
    }

    pub fn get_owner(&self, obj: ObjectId) -> Option<String> {
        self.store.lookup(obj, false).and_then(|slot| slot.owner())
    }

    /// Forget the label of a finalized object so a reused address reads clean.
    pub fn clear_object(&self, obj: ObjectId) {
        self.store.clear(obj);
    }

    /// Give `result` the union of its operands' owners.
    ///
    /// Owners are collected `a` first, then `b`, without repeats. When every
    /// collected address is plausible the whole list is stored; otherwise only
    /// the first plausible one is. An already tagged result is left alone, and
    /// untagged operands never pick up the thread's current owner.
    pub fn propagate(&self, result: ObjectId, a: Option<ObjectId>, b: Option<ObjectId>) {
        if self.get(result) {
            return;
        }

        let mut owners: Vec<String> = Vec::new();
        for owner in [a, b].into_iter().flatten().filter_map(|id| self.get_owner(id)) {
            for element in owner.split(',') {
                if !owners.iter().any(|o| o == element) {
                    owners.push(element.to_string());
                }
            }
        }
        if owners.is_empty() {
            return;
        }

        let stored = if owners.iter().all(|o| is_plausible_email(o)) {
            join_bounded(&owners, OWNER_MAX_BYTES)
        } else {
            match owners.iter().find(|o| is_plausible_email(o)) {
                Some(first) => first.clone(),
                None => return,
            }
        };
        let primary = match stored.split(',').next() {
            Some(primary) if !primary.is_empty() => primary.to_string(),
            _ => return,
        };

        if self.apply_owner(result, &stored, &primary) {
            self.record(StatEvent::Propagated);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_support::FakeHost;
    use crate::config::RuntimeConfig;
    use crate::host::{HostObject, HostValue, ObjectId};
    use crate::identity;
    use crate::runtime::test_support::runtime_with_buffer;
    use crate::runtime::Runtime;

    fn id(addr: usize) -> ObjectId {
        ObjectId::from_addr(addr).unwrap()
    }

    #[test]
    fn test_tag_owned_sets_owner_and_current() {
        identity::clear();
        let (rt, _) = runtime_with_buffer(FakeHost::default());
        let obj = HostValue::text("secret");

        rt.tag_owned(obj.id(), Some("alice@example.com"));
        assert!(rt.get(obj.id()));
        assert_eq!(rt.get_owner(obj.id()).as_deref(), Some("alice@example.com"));
        assert_eq!(identity::get().as_deref(), Some("alice@example.com"));
        assert_eq!(rt.stats().tags_applied, 1);
    }

    #[test]
    fn test_implausible_owner_is_refused() {
        identity::clear();
        let (rt, _) = runtime_with_buffer(FakeHost::default());
        let obj = HostValue::text("secret");

        rt.tag_owned(obj.id(), Some("<unknown>"));
        assert!(!rt.get(obj.id()));
        rt.tag_owned(obj.id(), Some("not-an-email"));
        assert!(!rt.get(obj.id()));
        assert_eq!(identity::get(), None);
        assert_eq!(rt.stats().tags_refused, 2);

        // A refused retag leaves an existing label untouched.
        rt.tag_owned(obj.id(), Some("alice@example.com"));
        rt.tag_owned(obj.id(), Some("@:"));
        assert_eq!(rt.get_owner(obj.id()).as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_tag_uses_current_owner() {
        let (rt, _) = runtime_with_buffer(FakeHost::default());

        identity::clear();
        rt.tag(id(0x100));
        assert!(!rt.get(id(0x100)));

        identity::set("carol@example.com");
        rt.tag(id(0x100));
        assert_eq!(rt.get_owner(id(0x100)).as_deref(), Some("carol@example.com"));

        identity::set("garbage");
        rt.tag(id(0x200));
        assert!(!rt.get(id(0x200)));
    }

    #[test]
    fn test_untracked_object_is_clean() {
        let (rt, _) = runtime_with_buffer(FakeHost::default());
        assert!(!rt.get(id(0x300)));
        assert_eq!(rt.get_owner(id(0x300)), None);
    }

    #[test]
    fn test_clear_object_then_reuse() {
        let config = RuntimeConfig {
            table_capacity: 4,
            report_stats_on_drop: false,
            ..Default::default()
        };
        let rt = Runtime::with_writer(
            config,
            Box::new(FakeHost::default()),
            Box::new(std::io::sink()),
        );
        let addrs = [0x10, 0x20, 0x30, 0x40];
        for addr in addrs {
            rt.tag_owned(id(addr), Some("alice@example.com"));
        }
        for addr in addrs {
            rt.clear_object(id(addr));
            assert!(!rt.get(id(addr)));
        }
        // Every slot still belongs to its old key; reused addresses tag again.
        for addr in addrs {
            rt.tag_owned(id(addr), Some("bob@example.com"));
            assert_eq!(rt.get_owner(id(addr)).as_deref(), Some("bob@example.com"));
        }
        // A fifth address has nowhere to go and is dropped silently.
        rt.tag_owned(id(0x50), Some("bob@example.com"));
        assert!(!rt.get(id(0x50)));
        assert!(rt.stats().saturation_misses > 0);
    }

    #[test]
    fn test_propagate_merges_owners_in_order() {
        identity::clear();
        let (rt, _) = runtime_with_buffer(FakeHost::default());
        let (a, b, r) = (id(0x1000), id(0x2000), id(0x3000));
        rt.tag_owned(a, Some("alice@example.com"));
        rt.tag_owned(b, Some("bob@example.com"));

        rt.propagate(r, Some(a), Some(b));
        assert_eq!(
            rt.get_owner(r).as_deref(),
            Some("alice@example.com,bob@example.com")
        );
        assert_eq!(identity::get().as_deref(), Some("alice@example.com"));
        assert_eq!(rt.stats().propagations, 1);
    }

    #[test]
    fn test_propagate_single_and_repeated_owner() {
        let (rt, _) = runtime_with_buffer(FakeHost::default());
        let (a, r1, r2) = (id(0x1000), id(0x2000), id(0x3000));
        rt.tag_owned(a, Some("alice@example.com"));

        rt.propagate(r1, None, Some(a));
        assert_eq!(rt.get_owner(r1).as_deref(), Some("alice@example.com"));

        rt.propagate(r2, Some(a), Some(r1));
        assert_eq!(rt.get_owner(r2).as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_propagate_never_invents_owner() {
        identity::set("alice@example.com");
        let (rt, _) = runtime_with_buffer(FakeHost::default());
        let (a, b, r) = (id(0x1000), id(0x2000), id(0x3000));

        rt.propagate(r, Some(a), Some(b));
        assert!(!rt.get(r));
        rt.propagate(r, None, None);
        assert!(!rt.get(r));
    }

    #[test]
    fn test_propagate_keeps_existing_label() {
        let (rt, _) = runtime_with_buffer(FakeHost::default());
        let (a, r) = (id(0x1000), id(0x2000));
        rt.tag_owned(a, Some("alice@example.com"));
        rt.tag_owned(r, Some("bob@example.com"));

        rt.propagate(r, Some(a), None);
        assert_eq!(rt.get_owner(r).as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn test_propagate_through_chains() {
        let (rt, _) = runtime_with_buffer(FakeHost::default());
        let (a, b, c, ab, abc) = (id(0x10), id(0x20), id(0x30), id(0x40), id(0x50));
        rt.tag_owned(a, Some("a@example.com"));
        rt.tag_owned(b, Some("b@example.com"));
        rt.tag_owned(c, Some("c@example.com"));

        rt.propagate(ab, Some(a), Some(b));
        rt.propagate(abc, Some(ab), Some(c));
        assert_eq!(
            rt.get_owner(abc).as_deref(),
            Some("a@example.com,b@example.com,c@example.com")
        );
    }
}
