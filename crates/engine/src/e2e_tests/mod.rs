//! End-to-end tests through the axum router.
//!
//! Each test builds the full `App` over a fresh SQLite file, seeds the
//! fixture geography and drives the router with `tower::ServiceExt::oneshot`.
//!
//! ```bash
//! cargo test -p divemap-engine --lib e2e_tests
//! ```

mod e2e_helpers;
mod loc_tests;

pub use e2e_helpers::*;
