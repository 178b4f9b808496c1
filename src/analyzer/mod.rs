// Analyzer module: price candidates, the extraction pipeline, buy signals and product snapshots.

pub mod candidates;
pub mod extract;
pub mod signal;
pub mod snapshot;
