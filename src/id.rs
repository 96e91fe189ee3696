//! Typed id newtypes for interned entities.
//!
//! Every interned entity (variable, constant, literal, function symbol,
//! predicate, function term) is identified by a small integer issued by the
//! session interner. Wrapping the integers in distinct newtypes means the
//! compiler catches id mix-ups (a `VarId` cannot be used where a `PredId` is
//! expected) while keeping comparisons and hashing as cheap as on a `u32`.

/// Defines a `u32` newtype id with `Debug`/`Display` impls and index helpers.
macro_rules! define_id {
    ($v:vis $name:ident, $doc:tt) => {
        #[doc = $doc]
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $v struct $name(u32);

        impl $name {
            /// Build an id from an arena index.
            #[inline]
            $v fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            /// The arena index this id points at.
            #[inline]
            $v fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(pub VarId, "Id of an interned variable.");
define_id!(pub ConstId, "Id of an interned constant.");
define_id!(pub LitId, "Id of an interned literal value.");
define_id!(pub SymId, "Id of an interned function symbol.");
define_id!(pub PredId, "Id of an interned predicate (name + arity).");
define_id!(pub FnTermId, "Id of an interned function term (symbol + arguments).");
