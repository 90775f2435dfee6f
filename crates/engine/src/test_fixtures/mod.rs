//! Test fixtures shared by the HTTP and store tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_fixtures::geography_seeder::seed_geography;
//!
//! #[tokio::test]
//! async fn test_santa_monica_scope() {
//!     let (_dir, repos) = temp_repositories().await;
//!     let seeded = seed_geography(&repos).await;
//!     let sm = seeded.node("santa-monica");
//!     // ... test logic
//! }
//! ```

pub mod geography_seeder;
