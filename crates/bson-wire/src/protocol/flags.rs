//! Bit flags carried in request and reply bodies.

use std::ops::BitOr;

macro_rules! flags {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $flag:ident = $bit:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(i32);

        impl $name {
            pub const NONE: $name = $name(0);
            $($(#[$fmeta])* pub const $flag: $name = $name($bit);)*

            pub const fn from_bits(bits: i32) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> i32 {
                self.0
            }

            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

flags!(
    /// Insert options.
    InsertFlags {
        /// Keep inserting the rest of the batch after a failed document.
        CONTINUE_ON_ERROR = 1,
    }
);

flags!(
    /// Update options.
    UpdateFlags {
        /// Insert the update document if nothing matches the selector.
        UPSERT = 1,
        /// Update every matching document instead of the first.
        MULTI_UPDATE = 2,
    }
);

flags!(
    /// Delete options.
    DeleteFlags {
        /// Remove only the first matching document.
        SINGLE_REMOVE = 1,
    }
);

flags!(
    /// Query options.
    QueryFlags {
        TAILABLE_CURSOR = 2,
        SLAVE_OK = 4,
        OPLOG_REPLAY = 8,
        NO_CURSOR_TIMEOUT = 16,
        AWAIT_DATA = 32,
        EXHAUST = 64,
        PARTIAL = 128,
    }
);

flags!(
    /// Flags set by the server on a reply.
    ResponseFlags {
        CURSOR_NOT_FOUND = 1,
        QUERY_FAILURE = 2,
        SHARD_CONFIG_STALE = 4,
        AWAIT_CAPABLE = 8,
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_and_contains() {
        let flags = QueryFlags::TAILABLE_CURSOR | QueryFlags::AWAIT_DATA;
        assert_eq!(flags.bits(), 34);
        assert!(flags.contains(QueryFlags::AWAIT_DATA));
        assert!(!flags.contains(QueryFlags::EXHAUST));
        assert!(flags.contains(QueryFlags::NONE));
        assert_eq!(ResponseFlags::from_bits(9), ResponseFlags::CURSOR_NOT_FOUND | ResponseFlags::AWAIT_CAPABLE);
    }
}
