//! # Chrome DevTools Protocol (CDP) layer
//!
//! WebSocket plumbing between the harness and a running Chrome/Chromium.
//!
//! ## Module structure
//! - `traits`: connection, client and browser interfaces
//! - `types`: JSON-RPC wire structures
//! - `connection`: WebSocket connection with a background reader task
//! - `client`: typed page-level client (navigate, evaluate, current URL)
//! - `browser`: isolated page targets, one browser context each
//! - `mock`: scriptable implementations for tests
//!
//! ## Example
//! ```rust,no_run
//! use chaser_harness::cdp::{CdpBrowser, CdpBrowserImpl, CdpClient};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let browser = CdpBrowserImpl::new("ws://localhost:9222");
//! let target = browser.create_target().await?;
//! let client = browser.create_client(&target).await?;
//!
//! let result = client.navigate("https://www.saucedemo.com/", Duration::from_secs(30)).await?;
//! println!("Navigated to: {}", result.url);
//!
//! browser.dispose_target(&target).await?;
//! # Ok(())
//! # }
//! ```

pub mod traits;
pub mod types;
pub mod connection;
pub mod client;
pub mod browser;
pub mod mock;

#[cfg(test)]
mod tests;

pub use traits::{
    CdpConnection, CdpClient, CdpBrowser, CdpEvent, CdpResponse, CdpError,
    NavigationResult, EvaluationResult, BrowserVersion, TargetHandle,
};

// Re-export implementation structs
pub use connection::CdpWebSocketConnection;
pub use client::CdpClientImpl;
pub use browser::CdpBrowserImpl;

// Re-export mock for development/testing
pub use mock::{MockCdpBrowser, MockCdpClient, MockCdpConnection};
