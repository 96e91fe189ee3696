//! Backward chaining: piece unifiers and UCQ rewriting.

pub mod disjunctive;
pub mod ucq;
pub mod unifier;

pub use disjunctive::{DisjunctivePieceUnifier, DisjunctivePieceUnifierAlgorithm};
pub use ucq::{compute_cover, remove_more_specific_than, rewrite};
pub use unifier::{most_general_piece_unifiers, piece_unifier_exists, PieceUnifier};
