//! Concrete VCS adapter implementations.

pub mod git;

pub use git::GitVcsAdapter;
