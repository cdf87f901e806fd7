//! Composync: query composition synchronizer for embedded code editors
//!
//! Translates a structured query-builder selection into query text, keeps
//! that text live-patched into a shared editable buffer, and detects when
//! direct edits inside the managed region mean the user has taken over.
//!
//! # Architecture
//!
//! Rendering is a single pure function: [`render`] turns a [`Selection`]
//! into clause text plus the line/column extents needed to size the managed
//! region. All buffer mutation funnels through one primitive, an atomic
//! range replacement tagged with an [`EditOrigin`], so the synchronizer can
//! tell its own writes apart from everything else in the change feed.
//!
//! A [`SyncSession`] owns the buffer for one editing session. Sync ends
//! permanently the first time an external edit lands inside the composition;
//! the host starts a new session to resume builder sync.
//!
//! # Example
//!
//! ```
//! use composync::{render, DbRp, Selection};
//!
//! let selection = Selection {
//!     measurement: Some("cpu".to_string()),
//!     dbrp: Some(DbRp {
//!         database: "telegraf".to_string(),
//!         retention_policy: "autogen".to_string(),
//!     }),
//!     ..Default::default()
//! };
//!
//! let composition = render(&selection);
//! assert_eq!(composition.text, "SELECT *\nFROM telegraf.autogen.\"cpu\"");
//! ```

pub mod buffer;
pub mod compose;
pub mod notify;
pub mod selection;
pub mod sync;

// Re-exports
pub use buffer::{
    BufferError, ContentChange, EditOrigin, Position, Range, TextBuffer, END_OF_LINE,
};
pub use compose::{render, Composition, PLACEHOLDER_TEXT};
pub use notify::{composition_ended, CollectingNotifier, LogNotifier, Notification, Notifier};
pub use selection::{diff, DbRp, Selection, SelectionDiff, TagValue, TimeRange};
pub use sync::{SyncEvent, SyncSession, SyncState};
