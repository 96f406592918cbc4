pub mod areas;
pub mod seasons;

// Re-export command functions for convenience
pub use areas::{decide, AreasSummary, RunInputs, RunMode};
pub use seasons::SeasonsSummary;
