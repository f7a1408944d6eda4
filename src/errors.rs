//! Scoped error suppression for teardown.
//!
//! Removing a client races against the client destroying itself, so the
//! requests issued while tearing it down may name windows that are already
//! gone. [`ErrorGuard`] holds the server grab and discards protocol errors
//! for as long as it lives.

use anyhow::Result;

use crate::xconn::XConn;

/// Grabs the server and suppresses protocol errors until dropped.
///
/// Dropping restores error reporting and releases the grab on every exit
/// path, including early returns through `?`.
pub struct ErrorGuard<'a, X: XConn> {
    conn: &'a X,
}

impl<'a, X: XConn> ErrorGuard<'a, X> {
    pub fn engage(conn: &'a X) -> Result<Self> {
        conn.grab_server()?;
        conn.suppress_errors();
        Ok(Self { conn })
    }
}

impl<X: XConn> Drop for ErrorGuard<'_, X> {
    fn drop(&mut self) {
        if let Err(e) = self.conn.restore_errors() {
            log::warn!("Failed to resync after suppressed errors: {}", e);
        }
        if let Err(e) = self.conn.ungrab_server() {
            log::warn!("Failed to ungrab server: {}", e);
        }
    }
}
