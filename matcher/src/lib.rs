//! Descriptor matching for faceid.
//!
//! A query matches a stored descriptor when their Euclidean distance is
//! strictly below [`MATCH_THRESHOLD`]. The scan is linear over the candidate
//! set; record sets are small enough that no index is kept.

pub mod matcher;

pub use matcher::{distance, BestMatch, DescriptorMatcher, MATCH_THRESHOLD};
