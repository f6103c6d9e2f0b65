//! # Page session layer
//!
//! One isolated page per test, addressed through element references instead of
//! raw scripts.
//!
//! ## Module structure
//! - `traits`: `PageSession` plus the reference, query and action vocabulary
//! - `js`: script generation for the CDP implementation
//! - `page`: `CdpPageSession`, the CDP-backed implementation
//! - `mock`: `MockPage`, an in-memory fake DOM for deterministic tests
//!
//! ## Example
//! ```rust,no_run
//! use chaser_harness::session::{DomQuery, ElementReference, PageSession, Selection};
//! use std::sync::Arc;
//!
//! # async fn example(session: Arc<dyn PageSession>) -> Result<(), Box<dyn std::error::Error>> {
//! session.goto("https://www.saucedemo.com/").await?;
//! let outcome = session
//!     .query(&ElementReference::id("login-button"), Selection::Strict, &DomQuery::Visible)
//!     .await?;
//! println!("matches: {}", outcome.count);
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod js;
pub mod page;
pub mod mock;

pub use traits::{
    ActionOutcome, DomAction, DomQuery, ElementReference, PageSession, QueryOutcome, Selection,
    Selector,
};

// Re-export implementation structs
pub use page::CdpPageSession;

// Re-export mock implementations for testing
pub use mock::{FakeDom, FakeElement, MockPage};
