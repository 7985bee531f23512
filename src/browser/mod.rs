//! Chromium integration over the Chrome DevTools Protocol
//!
//! [`BrowserSession`] launches or attaches to a browser, [`ChromePage`] exposes a tab as a
//! [`crate::page::Page`], and [`ChromeRasterizer`] prints rendered documents to PDF.

pub mod config;
pub mod page;
pub mod rasterizer;
pub mod session;

pub use config::{ConnectionOptions, LaunchOptions};
pub use page::ChromePage;
pub use rasterizer::ChromeRasterizer;
pub use session::BrowserSession;
