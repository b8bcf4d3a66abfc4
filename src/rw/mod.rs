//! The combinator algebra
// (c) 2025 Ross Younger

//! Every on-wire shape in this protocol, from a single big-endian integer up to a whole
//! message body, is described as a composition of small combinators. Each combinator
//! bundles three operations over one logical wire value:
//!
//! * `read` — consumes bytes from a [`ByteStream`](crate::transport::ByteStream),
//!   produces a [`Value`], or fails.
//! * `write` — emits bytes for a given [`Value`]; may fail if the value is out of the
//!   combinator's domain.
//! * `width` — the *header-contribution* width: the number of bytes the combinator
//!   unconditionally contributes regardless of the value written. For variable-length
//!   combinators (length-prefixed strings, chains or dictionaries that contain them) this
//!   is the fixed prefix/size-field width, **not** the full serialized size. `width` lets
//!   the frame codec pre-size things without materializing a payload twice; it is not a
//!   promise that a subsequent `write` will emit exactly that many bytes.
//!
//! [`Rw`] models the algebra as a closed tagged sum rather than a trait-object
//! hierarchy: this keeps leaves allocation-free, keeps the set of shapes exhaustively
//! matchable, and mirrors how a systems implementation of this kind of interpreter is
//! usually built (see `DESIGN.md`).
//!
//! The source specification also describes an `instance(constructor, ...)` combinator:
//! "like `dictionary`, but the decoded record is passed as named arguments to a
//! constructor". On the wire it is identical to [`Rw::dictionary`] — there is no
//! additional byte contributed by the act of constructing a typed value — so this crate
//! does not carry a separate `Instance` variant. The construction step lives in
//! [`crate::message`], where each message variant converts the decoded
//! [`Value::Map`] into its own typed struct. See `DESIGN.md` for the rationale.

mod codec;

use std::collections::BTreeMap;

/// A decoded (or about-to-be-encoded) wire value.
///
/// This is the dynamic value type the combinator algebra reads into and writes from.
/// Concrete message types in [`crate::message`] convert between this and their own
/// named fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absent value produced by [`Rw::none`], or by a [`Rw::switch`] case that was
    /// not recognised.
    None,
    /// An unsigned integer, as produced by [`Rw::number`].
    UInt(u64),
    /// Raw bytes, as produced by a binary [`Rw::len_prefixed_string`].
    Bytes(Vec<u8>),
    /// A UTF-8 string, as produced by a non-binary [`Rw::len_prefixed_string`].
    Str(String),
    /// An ordered tuple, as produced by [`Rw::chain`].
    Tuple(Vec<Value>),
    /// A named record, as produced by [`Rw::dictionary`].
    Map(BTreeMap<String, Value>),
    /// An ordered sequence of key/value pairs, as produced by [`Rw::headers`].
    /// Duplicate keys are preserved.
    Pairs(Vec<(Value, Value)>),
    /// A `(tag, payload)` pair, as produced by [`Rw::switch`].
    Tagged(u64, Box<Value>),
}

impl Value {
    /// Constructs a [`Value::Map`] from an iterator of `(name, value)` pairs.
    #[must_use]
    pub fn map(fields: impl IntoIterator<Item = (&'static str, Value)>) -> Value {
        Value::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    /// Looks up a field in a [`Value::Map`]. Returns `None` if `self` is not a map, or
    /// the key is absent.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(name),
            _ => None,
        }
    }
}

/// A key position inside [`Rw::dictionary`]/[`Rw::headers`]-style composites.
///
/// `Skip` is the sentinel described in the specification: a position that is read and
/// discarded (and, on write, replayed against its combinator's natural zero value)
/// without ever appearing in the decoded [`Value::Map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKey {
    /// A field that round-trips into/out of the decoded [`Value::Map`] under this name.
    Named(&'static str),
    /// A field that is read and discarded, and written back as its combinator's zero
    /// value. Never appears in a decoded [`Value::Map`].
    Skip,
}

/// The combinator algebra, closed under composition.
///
/// Build one with the associated functions below, then drive it with
/// [`Rw::read`]/[`Rw::write`]/[`Rw::width`].
#[derive(Debug, Clone)]
pub enum Rw {
    /// The unit combinator: reads nothing, writes nothing, width 0.
    None,
    /// A big-endian unsigned integer of this many bytes (1, 2, 4 or 8).
    Number(u8),
    /// Always reads/writes `value` through `inner`, ignoring whatever was actually
    /// decoded or passed in. Used for reserved/padding fields.
    Constant(Box<Rw>, Box<Value>),
    /// A length (via `len_rw`) followed by that many bytes, decoded as UTF-8 unless
    /// `is_binary` is set, in which case the raw bytes are kept.
    LenPrefixedString {
        /// Combinator for the length prefix.
        len_rw: Box<Rw>,
        /// Whether the payload is raw bytes (`true`) or a UTF-8 string (`false`).
        is_binary: bool,
    },
    /// An ordered sequence of child combinators, read/written as a [`Value::Tuple`].
    Chain(Vec<Rw>),
    /// A named record. On write, a field whose key is absent from the supplied map (or
    /// which is [`FieldKey::Skip`]) falls back to its combinator's zero value.
    Dictionary(Vec<(FieldKey, Rw)>),
    /// `len_rw`-counted `(key_rw, value_rw)` pairs, read/written as [`Value::Pairs`].
    Headers {
        /// Combinator for the pair count.
        len_rw: Box<Rw>,
        /// Combinator for each pair's key.
        key_rw: Box<Rw>,
        /// Combinator for each pair's value.
        value_rw: Box<Rw>,
    },
    /// Reads/writes a tag via `tag_rw`, then dispatches to the matching entry of
    /// `cases` for the payload. An unrecognised tag reads/writes no further bytes.
    Switch {
        /// Combinator for the tag.
        tag_rw: Box<Rw>,
        /// Tag-keyed payload combinators.
        cases: BTreeMap<u64, Rw>,
    },
    /// Forwards to `inner` unchanged. Used to attach a named wire shape to a message
    /// variant without reshaping it.
    Delegating(Box<Rw>),
}

impl Rw {
    /// The unit combinator.
    #[must_use]
    pub fn none() -> Rw {
        Rw::None
    }

    /// A big-endian unsigned integer of `width` bytes.
    ///
    /// # Panics
    /// Panics if `width` is not one of 1, 2, 4 or 8. Combinators are built once, at
    /// startup, by the message catalog; this is a programmer error, not a runtime one.
    #[must_use]
    pub fn number(width: u8) -> Rw {
        assert!(
            matches!(width, 1 | 2 | 4 | 8),
            "number width must be 1, 2, 4 or 8 bytes, got {width}"
        );
        Rw::Number(width)
    }

    /// Delegates width/write shape to `inner`, but always round-trips to `value`.
    #[must_use]
    pub fn constant(inner: Rw, value: Value) -> Rw {
        Rw::Constant(Box::new(inner), Box::new(value))
    }

    /// A length-prefixed string or byte string.
    #[must_use]
    pub fn len_prefixed_string(len_rw: Rw, is_binary: bool) -> Rw {
        Rw::LenPrefixedString {
            len_rw: Box::new(len_rw),
            is_binary,
        }
    }

    /// An ordered sequence of combinators.
    #[must_use]
    pub fn chain(children: Vec<Rw>) -> Rw {
        Rw::Chain(children)
    }

    /// A named record.
    #[must_use]
    pub fn dictionary(fields: Vec<(FieldKey, Rw)>) -> Rw {
        Rw::Dictionary(fields)
    }

    /// `len_rw`-counted key/value pairs.
    #[must_use]
    pub fn headers(len_rw: Rw, key_rw: Rw, value_rw: Rw) -> Rw {
        Rw::Headers {
            len_rw: Box::new(len_rw),
            key_rw: Box::new(key_rw),
            value_rw: Box::new(value_rw),
        }
    }

    /// Tag-dispatched payload selection.
    #[must_use]
    pub fn switch(tag_rw: Rw, cases: BTreeMap<u64, Rw>) -> Rw {
        Rw::Switch {
            tag_rw: Box::new(tag_rw),
            cases,
        }
    }

    /// Forwards to `inner` unchanged.
    #[must_use]
    pub fn delegating(inner: Rw) -> Rw {
        Rw::Delegating(Box::new(inner))
    }

    /// Looks up the payload combinator registered for `tag` in a [`Rw::Switch`].
    ///
    /// Returns `None` both when `self` is not a switch and when the tag is
    /// unrecognised; callers that need "empty payload" behavior for the latter case
    /// should fall back to [`Rw::none`] themselves (see
    /// [`crate::message::body_rw_for_tag`]).
    #[must_use]
    pub fn case_for(&self, tag: u64) -> Option<&Rw> {
        match self {
            Rw::Switch { cases, .. } => cases.get(&tag),
            _ => None,
        }
    }
}
