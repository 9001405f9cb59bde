//! Object identity and lazily resolved indirect references.

use crate::Error;
use crate::resolve::Resolver;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// The number of bits reserved for the generation in [`ObjectKey::internal_hash`].
const GENERATION_BITS: u32 = 16;

/// The identity of an indirect object: object number plus generation.
///
/// Keys order primarily by object number, then by generation, consistent
/// with equality. They are the canonical map key for a document's object
/// table and for the resource cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    number: i64,
    generation: i32,
}

impl ObjectKey {
    /// Create a new key. Both fields must be non-negative.
    pub fn new(number: i64, generation: i32) -> Result<Self, Error> {
        if number < 0 {
            return Err(Error::InvalidArgument("object number must not be negative"));
        }

        if generation < 0 {
            return Err(Error::InvalidArgument(
                "generation number must not be negative",
            ));
        }

        Ok(Self { number, generation })
    }

    /// The object number.
    pub fn number(&self) -> i64 {
        self.number
    }

    /// The generation number.
    pub fn generation(&self) -> i32 {
        self.generation
    }

    /// A stable packed form of the key, used by cache bookkeeping.
    ///
    /// Generations above 16 bits are folded; within one document that range
    /// is never exceeded.
    pub fn internal_hash(&self) -> u64 {
        ((self.number as u64) << GENERATION_BITS) | (self.generation as u64 & 0xffff)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// A primitive COS value.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// The null object.
    Null,
    /// A boolean.
    Boolean(bool),
    /// An integer number.
    Integer(i64),
    /// A real number.
    Real(f32),
    /// A name, without the leading slash.
    Name(String),
    /// A string, as raw bytes.
    String(Vec<u8>),
    /// An array of values.
    Array(Vec<Object>),
    /// A dictionary keyed by name.
    Dict(HashMap<String, Object>),
    /// A stream: its dictionary plus the byte range of the encoded data
    /// within the document, read on demand through the resolver.
    Stream {
        /// The stream dictionary.
        dict: HashMap<String, Object>,
        /// Offset of the encoded data.
        start: u64,
        /// Length of the encoded data.
        length: u64,
    },
    /// A reference to another indirect object.
    Reference(ObjectKey),
}

/// A lazily resolved reference to an indirect object.
///
/// The referenced value is owned by the document's object table; this type
/// holds the key and, for indirect references, a handle to the resolver that
/// can materialize the value on demand. It never owns the document.
///
/// A reference is either *direct* (the value was in hand at construction) or
/// *indirect* (only the key is known). [`resolve`](Self::resolve) is
/// idempotent from the caller's perspective: the first call may trigger
/// on-demand decoding, later calls return the memoized value.
pub struct IndirectObject {
    key: ObjectKey,
    slot: Mutex<Option<Arc<Object>>>,
    resolver: Option<Arc<dyn Resolver>>,
}

impl IndirectObject {
    /// A reference whose value is already known.
    pub fn direct(key: ObjectKey, value: Object) -> Self {
        Self {
            key,
            slot: Mutex::new(Some(Arc::new(value))),
            resolver: None,
        }
    }

    /// A reference that must be dereferenced through `resolver`.
    pub fn indirect(key: ObjectKey, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            key,
            slot: Mutex::new(None),
            resolver: Some(resolver),
        }
    }

    /// The identity of the referenced object.
    pub fn key(&self) -> ObjectKey {
        self.key
    }

    /// Whether the referenced value has been materialized.
    pub fn is_resolved(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    /// Dereference this reference.
    ///
    /// The first call on an indirect reference asks the resolver to decode
    /// the value; the result is kept so that later calls return it without
    /// touching the resolver again.
    pub fn resolve(&self) -> Result<Arc<Object>, Error> {
        let mut slot = self.slot.lock().unwrap();

        if let Some(value) = &*slot {
            return Ok(value.clone());
        }

        let resolver = self
            .resolver
            .as_ref()
            .ok_or(Error::MissingObject(self.key))?;
        let value = Arc::new(resolver.dereference(self.key)?);
        *slot = Some(value.clone());

        Ok(value)
    }
}

impl fmt::Debug for IndirectObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndirectObject")
            .field("key", &self.key)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{IndirectObject, Object, ObjectKey};
    use crate::Error;
    use crate::resolve::{ReadView, Resolver};
    use std::cmp::Ordering;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    #[test]
    fn key_rejects_negative_fields() {
        assert!(matches!(
            ObjectKey::new(-1, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ObjectKey::new(3, -1),
            Err(Error::InvalidArgument(_))
        ));
        assert!(ObjectKey::new(0, 0).is_ok());
    }

    #[test]
    fn key_orders_by_number_then_generation() {
        let low = ObjectKey::new(1, 5).unwrap();
        let mid = ObjectKey::new(2, 0).unwrap();
        let high = ObjectKey::new(2, 1).unwrap();

        assert_eq!(low.cmp(&mid), Ordering::Less);
        assert_eq!(mid.cmp(&high), Ordering::Less);
        assert_eq!(high.cmp(&low), Ordering::Greater);
        assert_eq!(mid.cmp(&ObjectKey::new(2, 0).unwrap()), Ordering::Equal);
    }

    #[test]
    fn key_ordering_is_consistent_with_equality() {
        let a = ObjectKey::new(7, 2).unwrap();
        let b = ObjectKey::new(7, 2).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.internal_hash(), b.internal_hash());
    }

    struct CountingResolver {
        calls: AtomicU32,
    }

    impl Resolver for CountingResolver {
        fn dereference(&self, _: ObjectKey) -> Result<Object, Error> {
            self.calls.fetch_add(1, AtomicOrdering::Relaxed);
            Ok(Object::Integer(42))
        }

        fn create_view(&self, start: u64, length: u64) -> std::io::Result<ReadView> {
            Ok(ReadView::new(Arc::new(Vec::new()), start, length))
        }
    }

    #[test]
    fn indirect_resolution_is_idempotent() {
        let resolver = Arc::new(CountingResolver {
            calls: AtomicU32::new(0),
        });
        let obj = IndirectObject::indirect(ObjectKey::new(4, 0).unwrap(), resolver.clone());

        assert!(!obj.is_resolved());
        assert_eq!(*obj.resolve().unwrap(), Object::Integer(42));
        assert_eq!(*obj.resolve().unwrap(), Object::Integer(42));
        assert!(obj.is_resolved());
        assert_eq!(resolver.calls.load(AtomicOrdering::Relaxed), 1);
    }

    #[test]
    fn direct_reference_never_consults_a_resolver() {
        let obj = IndirectObject::direct(ObjectKey::new(9, 0).unwrap(), Object::Boolean(true));

        assert!(obj.is_resolved());
        assert_eq!(*obj.resolve().unwrap(), Object::Boolean(true));
    }
}
