//! Socket I/O, file I/O, and CLI glue binding `fxp-transport`'s pure
//! sender/receiver engines to the network (SPEC_FULL.md §2).

pub mod cli;
pub mod digest;
pub mod receiver;
pub mod sender;
