pub mod matching;
pub mod stats;
pub mod sync;
