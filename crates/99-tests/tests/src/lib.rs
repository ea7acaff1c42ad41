//! Cross-crate test suite for the shuttle transport.

#[cfg(test)]
mod native_e2e;

#[cfg(test)]
mod properties;
