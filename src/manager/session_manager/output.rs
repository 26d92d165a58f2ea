//! Buffered output retrieval with pagination

use crate::error::Result;
use crate::types::{OutputPage, SessionId};

use super::core::SessionManager;
use super::pagination::{calculate_has_more, resolve_window};

impl SessionManager {
    /// Read a page of a session's replay buffer
    ///
    /// A negative `offset` reads from the tail (`-5` = last five chunks).
    ///
    /// # Errors
    /// `SessionNotFound` for an unknown id.
    pub fn buffered_output(&self, id: SessionId, offset: i64, limit: usize) -> Result<OutputPage> {
        let session = self.registry.require(id)?;
        let total = session.chunk_count();
        let (start, len) = resolve_window(offset, limit, total);
        let (chunks, total) = session.buffered_range(start, len);

        Ok(OutputPage {
            id,
            has_more: calculate_has_more(start, chunks.len(), total),
            offset: start,
            total,
            chunks,
        })
    }
}
