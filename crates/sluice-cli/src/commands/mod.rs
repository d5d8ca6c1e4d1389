// crates/sluice-cli/src/commands/mod.rs
//
// Command module declarations for the Sluice CLI.

pub mod inspect;
pub mod simulate;
pub mod vp;
