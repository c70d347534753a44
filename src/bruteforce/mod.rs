//! Brute-force password search
//!
//! Candidates are enumerated tier by tier ([`Tier::ALL`]: digits, lowercase, uppercase,
//! digits+lowercase, digits+uppercase, digits+letters, everything), each tier from the
//! shortest to the longest length, and within one length in odometer order (leftmost
//! character varies slowest). [`BruteForceScheduler`] feeds that sequence through a bounded
//! queue to a pool of workers.

mod charset;
mod scheduler;


pub use charset::{Candidate, CandidateSpace, Odometer, Tier};
pub use scheduler::{BruteForceReport, BruteForceScheduler};
