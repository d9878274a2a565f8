// Cookies queued for the response

use super::cookie::Cookie;
use parking_lot::Mutex;

/// Cookies queued during a request and written to its response by the
/// cookies middleware. A later cookie with the same name replaces an
/// earlier one.
#[derive(Debug, Default)]
pub struct QueuedCookies {
    cookies: Mutex<Vec<Cookie>>,
}

impl QueuedCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, cookie: Cookie) {
        let mut cookies = self.cookies.lock();
        cookies.retain(|c| c.name != cookie.name);
        cookies.push(cookie);
    }

    /// Queue an expired cookie so the client drops `name`.
    pub fn forget(&self, name: &str) {
        self.queue(Cookie::expired(name));
    }

    pub fn has(&self, name: &str) -> bool {
        self.cookies.lock().iter().any(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.cookies.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.lock().is_empty()
    }

    pub fn drain(&self) -> Vec<Cookie> {
        std::mem::take(&mut *self.cookies.lock())
    }
}
