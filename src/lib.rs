//! Chaser-Harness: page-interaction and assertion harness for end-to-end browser tests
//!
//! Tests get an isolated page session from a [`Harness`], resolve element
//! references into lazy [`Handle`]s, drive forms through them and assert on the
//! result with [`expect`] and [`expect_page`]. Every action and assertion is a
//! bounded wait; nothing sleeps for a fixed time.
//!
//! ```rust,no_run
//! use chaser_harness::{authenticate, expect, AuthConfig, Credentials, Harness, HarnessConfig};
//! use chaser_harness::locator::resolve_css;
//!
//! # async fn example() -> chaser_harness::Result<()> {
//! let harness = Harness::new(HarnessConfig::default());
//! harness
//!     .run("login", |session| async move {
//!         let credentials = Credentials::new("standard_user", "secret_sauce");
//!         authenticate(&session, &credentials, &AuthConfig::saucedemo()).await?;
//!         expect(&resolve_css(&session, ".inventory_list")).to_be_visible().await
//!     })
//!     .await
//! # }
//! ```

pub mod error;
pub mod config;
pub mod logging;

pub mod cdp;
pub mod session;

pub mod wait;
pub mod url_pattern;
pub mod locator;
pub mod expect;
pub mod credentials;
pub mod sequence;
pub mod harness;

// Re-exports
pub use config::HarnessConfig;
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use expect::{expect, expect_page, Expectation, PageExpectation};
pub use harness::{Harness, SessionGuard};
pub use locator::{resolve, Handle};
pub use logging::init_tracing;
pub use sequence::{authenticate, AuthConfig, Sequence, Step, SuccessSignal};
pub use session::{ElementReference, PageSession, Selection};
pub use url_pattern::UrlPattern;
pub use wait::{WaitOptions, WaitOutcome};

/// Chaser-Harness library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
