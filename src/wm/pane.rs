//! Pane - the leaf payload of the layout tree.

use crate::core::session::Session;
use crate::store::ProfileId;

/// Unique identifier for a pane
pub type PaneId = u64;

/// A leaf pane hosting exactly one session.
///
/// The pane owns its session exclusively; the profile is referenced by id
/// and resolved through the profile store's fallback chain at render time.
pub struct Pane {
    pub id: PaneId,
    pub session: Session,
    pub profile_id: ProfileId,
    /// Whether this pane holds focus within its tab
    pub focused: bool,
}

impl Pane {
    pub fn new(id: PaneId, session: Session, profile_id: ProfileId) -> Self {
        Self {
            id,
            session,
            profile_id,
            focused: false,
        }
    }
}
