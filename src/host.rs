use std::num::NonZeroUsize;

/// Address identity of a live host object.
///
/// The zero address never names an object, so a "null" handle cannot be
/// constructed. Identities are borrowed: holding an `ObjectId` does not keep
/// the object alive, and the host may reuse the address after the object is
/// freed (see `Runtime::clear_object`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(NonZeroUsize);

impl ObjectId {
    pub fn from_addr(addr: usize) -> Option<Self> {
        NonZeroUsize::new(addr).map(ObjectId)
    }

    /// Identity of whatever `value` points at.
    pub fn of<T: ?Sized>(value: &T) -> Self {
        let addr = value as *const T as *const () as usize;
        // References are never null.
        ObjectId(NonZeroUsize::new(addr).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn addr(self) -> usize {
        self.0.get()
    }
}

/// View of an object's content, as far as the provenance engine cares.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
    Other,
}

impl<'a> Payload<'a> {
    /// Raw bytes for text and byte buffers, `None` for anything else.
    pub fn raw(&self) -> Option<&'a [u8]> {
        match *self {
            Payload::Text(s) => Some(s.as_bytes()),
            Payload::Bytes(b) => Some(b),
            Payload::Other => None,
        }
    }
}

/// An object handed to a sink by the host interpreter.
pub trait HostObject {
    fn id(&self) -> ObjectId;

    fn payload(&self) -> Payload<'_>;

    /// Host-level string conversion. `None` means the conversion raised.
    fn repr(&self) -> Option<String>;
}

/// Process-level facts supplied by the host.
pub trait HostEnv: Send + Sync {
    /// False while the interpreter is starting up or shutting down.
    fn is_initialized(&self) -> bool {
        true
    }

    /// True while the interpreter has an exception in flight.
    fn error_pending(&self) -> bool {
        false
    }

    fn pid(&self) -> u32;

    fn program_name(&self) -> Option<String>;

    fn argv(&self) -> Vec<String>;

    fn env_var(&self, name: &str) -> Option<String>;
}

/// `HostEnv` backed by the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeHost;

impl HostEnv for NativeHost {
    fn pid(&self) -> u32 {
        std::process::id()
    }

    fn program_name(&self) -> Option<String> {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    }

    fn argv(&self) -> Vec<String> {
        std::env::args_os()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var_os(name).map(|v| v.to_string_lossy().into_owned())
    }
}

#[derive(Debug)]
enum ValueData {
    Text(String),
    Bytes(Vec<u8>),
    Other(Option<String>),
}

/// Heap-allocated value whose identity is its heap address.
///
/// Stands in for interpreter objects in the CLI demo and in tests. Moving the
/// handle does not change its identity.
#[derive(Debug)]
pub struct HostValue {
    data: Box<ValueData>,
}

impl HostValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            data: Box::new(ValueData::Text(s.into())),
        }
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Box::new(ValueData::Bytes(b.into())),
        }
    }

    /// A non-text object with the given string repr (`None` = repr fails).
    pub fn other(repr: Option<&str>) -> Self {
        Self {
            data: Box::new(ValueData::Other(repr.map(str::to_string))),
        }
    }
}

impl HostObject for HostValue {
    fn id(&self) -> ObjectId {
        ObjectId::of(&*self.data)
    }

    fn payload(&self) -> Payload<'_> {
        match &*self.data {
            ValueData::Text(s) => Payload::Text(s),
            ValueData::Bytes(b) => Payload::Bytes(b),
            ValueData::Other(_) => Payload::Other,
        }
    }

    fn repr(&self) -> Option<String> {
        match &*self.data {
            ValueData::Text(s) => Some(s.clone()),
            ValueData::Bytes(b) => Some(format!("{:?}", String::from_utf8_lossy(b))),
            ValueData::Other(r) => r.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_address_has_no_identity() {
        assert!(ObjectId::from_addr(0).is_none());
        assert_eq!(ObjectId::from_addr(0x1000).unwrap().addr(), 0x1000);
    }

    #[test]
    fn test_host_value_identity_survives_moves() {
        let value = HostValue::text("hello");
        let id = value.id();
        let moved = value;
        assert_eq!(moved.id(), id);

        let other = HostValue::text("hello");
        assert_ne!(other.id(), id);
    }

    #[test]
    fn test_payload_views() {
        let text = HostValue::text("abc");
        assert_eq!(text.payload().raw(), Some(&b"abc"[..]));

        let opaque = HostValue::other(Some("<User>"));
        assert!(opaque.payload().raw().is_none());
        assert_eq!(opaque.repr().as_deref(), Some("<User>"));
        assert!(HostValue::other(None).repr().is_none());
    }
}
