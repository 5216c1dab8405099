//! Composite cursors tracking per-source read progress.
//!
//! A merged connection interleaves records from several independently paginated sources, so a
//! single integer offset cannot describe a resume point. A cursor here records the last consumed
//! index within every source, plus the overall position in the merged ordering. On the wire the
//! cursor is opaque to clients: base64 over `offsets:` followed by a query string with one
//! `key=value` pair per source and a `position` pair, where each value is either a non-negative
//! integer or the literal `null`.
//!
//! Decoding is a hard validation boundary. A cursor that fails to decode is rejected outright,
//! never silently treated as "start from the beginning": resuming from the wrong place would
//! corrupt the client's view of the merged sequence.

use super::{
    DuplicateSourceSnafu, EmptySourceSetSnafu, Error, InvalidSourceNameSnafu,
    MalformedCursorSnafu, MissingSourceSnafu, ReservedSourceSnafu, UnknownSourceSnafu,
};
use crate::graphql::connection::CursorType;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use itertools::Itertools;
use snafu::{ensure, OptionExt};
use std::collections::BTreeMap;

/// Key reserved for the overall position counter.
const POSITION_KEY: &str = "position";

/// Prefix identifying the cursor wire format.
const PREFIX: &str = "offsets";

/// Read progress through a fixed set of sources.
///
/// Each source maps to the index of the last record consumed from it, `None` until the first one
/// is consumed. `position` counts records consumed across all sources, `None` until the first.
/// The key set is fixed at construction and survives encode/decode round-trips unchanged.
///
/// States are immutable values: [`increment`](Self::increment) returns a new state, so snapshots
/// taken while walking a merged sequence stay valid. A state lives for one connection query and
/// is never persisted server-side; it travels to the client inside edge cursors instead.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OffsetState {
    offsets: BTreeMap<String, Option<u64>>,
    position: Option<u64>,
}

impl OffsetState {
    /// A state with no progress recorded for any of `sources`.
    ///
    /// The source set must be non-empty, free of duplicates, and must not use the reserved
    /// `position` key or delimiter characters; violations are configuration errors.
    pub fn empty<I, S>(sources: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut offsets = BTreeMap::new();
        for source in sources {
            let name = source.into();
            ensure!(
                !name.is_empty() && !name.contains(|c| c == '=' || c == '&' || c == ':'),
                InvalidSourceNameSnafu { name }
            );
            ensure!(name != POSITION_KEY, ReservedSourceSnafu { name });
            ensure!(
                offsets.insert(name.clone(), None).is_none(),
                DuplicateSourceSnafu { name }
            );
        }
        ensure!(!offsets.is_empty(), EmptySourceSetSnafu);
        Ok(Self {
            offsets,
            position: None,
        })
    }

    /// Deserialize a client-supplied cursor.
    pub fn decode(cursor: &str) -> Result<Self, Error> {
        let bytes = STANDARD
            .decode(cursor)
            .map_err(|error| malformed(format!("invalid base64: {error}")))?;
        let body = String::from_utf8(bytes)
            .map_err(|error| malformed(format!("invalid UTF-8: {error}")))?;
        let (prefix, query) = body
            .split_once(':')
            .ok_or_else(|| malformed("missing prefix"))?;
        ensure!(
            prefix == PREFIX,
            MalformedCursorSnafu {
                reason: format!("unexpected prefix {prefix:?}"),
            }
        );

        let mut offsets = BTreeMap::new();
        let mut position = None;
        for pair in query.split('&') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| malformed(format!("malformed pair {pair:?}")))?;
            let value = parse_offset(key, value)?;
            if key == POSITION_KEY {
                ensure!(
                    position.is_none(),
                    MalformedCursorSnafu {
                        reason: format!("duplicate key {key:?}"),
                    }
                );
                position = Some(value);
            } else {
                ensure!(
                    offsets.insert(key.to_owned(), value).is_none(),
                    MalformedCursorSnafu {
                        reason: format!("duplicate key {key:?}"),
                    }
                );
            }
        }

        let position = position.context(MalformedCursorSnafu {
            reason: "missing position",
        })?;
        ensure!(
            !offsets.is_empty(),
            MalformedCursorSnafu {
                reason: "no source offsets",
            }
        );
        Ok(Self { offsets, position })
    }

    /// Serialize this state into an opaque cursor.
    ///
    /// Exact inverse of [`decode`](Self::decode): `decode(encode(s)) == s` for every valid state.
    pub fn encode(&self) -> String {
        let query = self
            .offsets
            .iter()
            .map(|(key, value)| (key.as_str(), *value))
            .chain([(POSITION_KEY, self.position)])
            .map(|(key, value)| match value {
                Some(n) => format!("{key}={n}"),
                None => format!("{key}=null"),
            })
            .join("&");
        STANDARD.encode(format!("{PREFIX}:{query}"))
    }

    /// A copy of this state with one more record consumed from `source`.
    ///
    /// Advances that source's offset and the overall position together, `None` → 0 → 1 → …; the
    /// position never moves without a source offset moving with it. The input state is untouched.
    pub fn increment(&self, source: &str) -> Result<Self, Error> {
        let mut next = self.clone();
        let offset = next
            .offsets
            .get_mut(source)
            .context(UnknownSourceSnafu { name: source })?;
        *offset = Some(offset.map_or(0, |n| n + 1));
        next.position = Some(next.position.map_or(0, |n| n + 1));
        Ok(next)
    }

    /// The offset at which the next fetch from `source` must start: one past the last consumed
    /// record, or 0 when the source has not been read yet.
    pub fn next_offset(&self, source: &str) -> u64 {
        match self.offsets.get(source) {
            Some(Some(n)) => n + 1,
            _ => 0,
        }
    }

    /// The zero-based position in the merged ordering of the most recently consumed record, or
    /// `None` when nothing has been consumed.
    pub fn position(&self) -> Option<u64> {
        self.position
    }

    /// The sources this state tracks.
    pub fn sources(&self) -> impl '_ + Iterator<Item = &str> {
        self.offsets.keys().map(String::as_str)
    }

    /// Check that this state tracks exactly the sources named by `sources`.
    ///
    /// A cursor minted for one source set is meaningless against another; resuming from it would
    /// silently misalign every source, so the mismatch is rejected here.
    pub fn require_sources<'a, I>(&self, sources: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut expected = sources.into_iter().collect::<std::collections::BTreeSet<_>>();
        for name in self.offsets.keys().map(String::as_str) {
            ensure!(expected.remove(name), UnknownSourceSnafu { name });
        }
        match expected.into_iter().next() {
            Some(name) => MissingSourceSnafu { name }.fail(),
            None => Ok(()),
        }
    }
}

impl CursorType for OffsetState {
    type Error = Error;

    fn decode_cursor(s: &str) -> Result<Self, Self::Error> {
        Self::decode(s)
    }

    fn encode_cursor(&self) -> String {
        self.encode()
    }
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedCursor {
        reason: reason.into(),
    }
}

fn parse_offset(key: &str, value: &str) -> Result<Option<u64>, Error> {
    if value == "null" {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| malformed(format!("offset {key}={value} is not an integer")))
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn assert_body(state: &OffsetState, expected: &str) {
        let bytes = STANDARD.decode(state.encode()).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
    }

    #[test]
    fn test_wire_format() {
        let state = OffsetState::empty(["msg", "ord"]).unwrap();
        assert_body(&state, "offsets:msg=null&ord=null&position=null");

        let state = state.increment("msg").unwrap();
        assert_body(&state, "offsets:msg=0&ord=null&position=0");

        let state = state.increment("ord").unwrap();
        assert_body(&state, "offsets:msg=0&ord=0&position=1");
    }

    #[test]
    fn test_increment_is_pure() {
        let state = OffsetState::empty(["msg"]).unwrap();
        let advanced = state.increment("msg").unwrap();

        assert_eq!(state, OffsetState::empty(["msg"]).unwrap());
        assert_eq!(state.next_offset("msg"), 0);
        assert_eq!(state.position(), None);

        assert_eq!(advanced.position(), Some(0));
        assert_eq!(advanced.next_offset("msg"), 1);
    }

    #[test]
    fn test_increment_unknown_source() {
        let state = OffsetState::empty(["msg"]).unwrap();
        assert!(matches!(
            state.increment("ord"),
            Err(Error::UnknownSource { .. })
        ));
    }

    #[test]
    fn test_configuration_errors() {
        assert!(matches!(
            OffsetState::empty(Vec::<String>::new()),
            Err(Error::EmptySourceSet)
        ));
        assert!(matches!(
            OffsetState::empty(["msg", "msg"]),
            Err(Error::DuplicateSource { .. })
        ));
        assert!(matches!(
            OffsetState::empty(["position"]),
            Err(Error::ReservedSource { .. })
        ));
        assert!(matches!(
            OffsetState::empty(["a&b"]),
            Err(Error::InvalidSourceName { .. })
        ));
        assert!(matches!(
            OffsetState::empty([""]),
            Err(Error::InvalidSourceName { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_prefix() {
        let cursor = STANDARD.encode("progress:msg=0&position=0");
        assert!(matches!(
            OffsetState::decode(&cursor),
            Err(Error::MalformedCursor { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_integers() {
        for body in [
            "offsets:msg=x&position=0",
            "offsets:msg=-1&position=0",
            "offsets:msg=0&position=1.5",
        ] {
            let cursor = STANDARD.encode(body);
            assert!(
                matches!(
                    OffsetState::decode(&cursor),
                    Err(Error::MalformedCursor { .. })
                ),
                "decoded {body:?}"
            );
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        for cursor in [
            "not base64!!!",
            &STANDARD.encode("no separator"),
            &STANDARD.encode("offsets:msg&position=0"),
            &STANDARD.encode("offsets:msg=0"),
            &STANDARD.encode("offsets:position=0"),
            &STANDARD.encode("offsets:msg=0&msg=1&position=0"),
        ] {
            assert!(
                matches!(
                    OffsetState::decode(cursor),
                    Err(Error::MalformedCursor { .. })
                ),
                "decoded {cursor:?}"
            );
        }
    }

    fn state() -> impl Strategy<Value = OffsetState> {
        (
            proptest::collection::btree_map("[a-h]{1,8}", any::<Option<u32>>(), 1..4),
            any::<Option<u32>>(),
        )
            .prop_map(|(offsets, position)| OffsetState {
                offsets: offsets
                    .into_iter()
                    .map(|(key, value)| (key, value.map(u64::from)))
                    .collect(),
                position: position.map(u64::from),
            })
    }

    proptest! {
        #[test]
        fn test_round_trip(state in state()) {
            prop_assert_eq!(OffsetState::decode(&state.encode()).unwrap(), state);
        }
    }
}
