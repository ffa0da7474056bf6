pub mod crawler;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

pub use crawler::{BrowserPage, scroll_page};
pub use web::{BrowserOptions, WebDriverPage};
