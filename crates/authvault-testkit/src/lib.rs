//! In-memory fixtures shared by integration tests across the workspace
//! (spec.md §8 "Property tests ... scenario tests S1-S6 live against
//! authvault-testkit's in-memory tiers").

pub mod fakes;
pub mod harness;

pub use fakes::AlwaysFailingColdStore;
pub use harness::TestHarness;
