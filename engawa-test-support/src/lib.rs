//! Shared test tooling for the engawa workspace.
//!
//! Hosts the environment-tunable property-test profile and the reference
//! similarity oracles the core test suites are built from. Nothing in this
//! crate ships in a production build; it exists so the unit, property, and
//! integration suites exercise the same fixtures.

pub mod ci;
pub mod oracle;

pub use ci::property_test_profile::ProptestRunProfile;
pub use oracle::{LineOracle, QuantisedOracle, RingOracle};
