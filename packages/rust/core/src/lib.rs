//! Content adaptation pipeline for AccessCMS.
//!
//! This crate ties together the content schemas, the disability profile
//! catalog and the generation capability into the adaptation engine, and
//! maps its output onto storage through the record assembler.

pub mod assembler;
pub mod engine;
pub mod profiles;
pub mod schema;

#[cfg(test)]
mod testing;
