//! Terminal stand-in for the app's router

use accessgate_core::Navigator;
use colored::Colorize;

/// Prints navigations instead of routing. The renewal surface can
/// optionally be opened in the browser.
#[derive(Debug, Clone)]
pub struct TerminalNavigator {
    current: String,
    base_url: String,
    browser_surface: Option<String>,
}

impl TerminalNavigator {
    pub fn new(start: &str, base_url: &str) -> Self {
        Self {
            current: start.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            browser_surface: None,
        }
    }

    /// Opens `surface` in the browser whenever the gate navigates to it.
    pub fn with_browser(mut self, surface: &str) -> Self {
        self.browser_surface = Some(surface.to_string());
        self
    }

    /// Records a navigation the user made themselves.
    pub fn visit(&mut self, surface: &str) {
        self.current = surface.to_string();
    }

    pub fn url_for(&self, surface: &str) -> String {
        format!("{}/{}", self.base_url, surface.trim_start_matches('/'))
    }
}

impl Navigator for TerminalNavigator {
    fn current_surface(&self) -> String {
        self.current.clone()
    }

    fn navigate_to(&mut self, surface: &str) {
        eprintln!("  {} {}", "\u{2192}".cyan().bold(), surface.bold());
        self.current = surface.to_string();

        if self.browser_surface.as_deref() == Some(surface) {
            let url = self.url_for(surface);
            if let Err(e) = open::that(&url) {
                eprintln!("  {} Could not open browser: {}", "Error:".red().bold(), e);
                eprintln!("  Visit {} to renew.", url.bold());
            }
        }
    }
}
