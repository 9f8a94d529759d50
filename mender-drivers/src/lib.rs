//! Driver layer for browser automation.
//!
//! This crate binds the healing core to a real browser through WebDriver.
//!
//! - [`browser::driver::WebDriverSession`]: WebDriver client wrapper
//! - [`browser::page::WebDriverAdapter`]: the [`mender_core::AutomationAdapter`] implementation
//! - [`browser::selector`]: selector-engine strings to WebDriver locators
pub mod browser;

pub use browser::driver::WebDriverSession;
pub use browser::page::WebDriverAdapter;
