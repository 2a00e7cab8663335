//! Runtime that carries one relay at a time from trigger to `End`

mod executor;

#[cfg(test)]
pub mod testing;

#[allow(unused_imports)] // Public API re-exports
pub use executor::{RelayPermit, RelayRuntime};
