//! Registry discovery tests
//!
//! `RegistryClient` against a mock registry server.
