//! Helpers shared by the integration tests.

pub mod responders;
pub mod socket_guard;
pub mod workbook;
