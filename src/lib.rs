//! Docfan, a course document distributor.
//!
//! Distributes a source document to the students, groups and groupings of a course, tracking
//! every copy and share until the whole fan-out has reported back.

#![warn(missing_docs)]

pub mod cli;
