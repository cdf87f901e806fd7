use crate::buffer::{
    BufferError, ContentChange, EditOrigin, Range, TextBuffer, END_OF_LINE,
};
use crate::compose::{render, PLACEHOLDER_TEXT};
use crate::notify::{composition_ended, LogNotifier, Notifier};
use crate::selection::{Selection, SelectionDiff, TimeRange};
use std::collections::VecDeque;

/// Whether builder-driven sync is still live for this session.
///
/// `Ended` is terminal: once a qualifying external edit lands inside the
/// composition, the session never returns to `Synced`. A fresh session must
/// be started to resume builder sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synced,
    Ended,
}

/// Session-level events queued during change observation and drained by the
/// host after change dispatch finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// Sync ended; the host should flip its `synced` flag to false.
    SyncEnded,
}

/// One editing session's composition synchronizer.
///
/// Owns the text buffer exclusively for the session's lifetime, keeps the
/// rendered composition live-patched into it, and watches the change feed for
/// external edits that invalidate the managed region. Concurrent sessions
/// against one buffer are a caller contract violation, not a handled case.
pub struct SyncSession {
    buffer: TextBuffer,
    composition_range: Option<Range>,
    state: SyncState,
    time_range: TimeRange,
    notifier: Box<dyn Notifier>,
    events: VecDeque<SyncEvent>,
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncSession {
    /// Start a session over a fresh buffer holding the placeholder message.
    pub fn new() -> Self {
        Self::with_notifier(Box::new(LogNotifier))
    }

    pub fn with_notifier(notifier: Box<dyn Notifier>) -> Self {
        Self::over_buffer(TextBuffer::new(PLACEHOLDER_TEXT), notifier)
    }

    /// Start a session over an existing buffer, e.g. a restored draft.
    pub fn over_buffer(buffer: TextBuffer, notifier: Box<dyn Notifier>) -> Self {
        Self {
            buffer,
            composition_range: None,
            state: SyncState::Synced,
            time_range: TimeRange::default(),
            notifier,
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_synced(&self) -> bool {
        self.state == SyncState::Synced
    }

    /// The span currently owned by the composition, if one has been written.
    pub fn composition_range(&self) -> Option<Range> {
        self.composition_range
    }

    /// Current buffer content.
    pub fn text(&self) -> String {
        self.buffer.text()
    }

    /// Caller-side gate: true when a diff is non-empty or the time range
    /// moved since the last apply. The synchronizer itself does not enforce
    /// this; it exists to let callers skip redundant buffer writes.
    pub fn should_apply(&self, diff: &SelectionDiff, next_range: &TimeRange) -> bool {
        !diff.is_empty() || self.time_range != *next_range
    }

    /// Render `selection` and patch the result into the buffer.
    ///
    /// The first write clears the placeholder (if still present), inserts at
    /// the buffer start, and appends a trailing newline. Every later write
    /// replaces the current composition range, consuming the full remainder
    /// of the last owned line so shrinking text leaves no orphaned trailing
    /// characters. The edit is applied atomically with an `Internal` origin.
    pub fn apply(&mut self, selection: &Selection) -> Result<(), BufferError> {
        let composition = render(selection);

        let (target, text) = match self.composition_range {
            None => {
                if self.buffer.text() == PLACEHOLDER_TEXT {
                    self.buffer.set_text("", EditOrigin::PlaceholderRemoval);
                }
                (Range::new(1, 1, 1, 1), format!("{}\n", composition.text))
            }
            Some(range) => (
                Range::new(range.start.line, 1, range.end.line, END_OF_LINE),
                composition.text.clone(),
            ),
        };
        self.buffer.apply_edit(target, &text, EditOrigin::Internal)?;

        let start_line = target.start.line;
        self.composition_range = Some(Range::new(
            start_line,
            1,
            start_line + composition.lines - 1,
            composition.last_line_len + 1,
        ));
        self.time_range = selection.time_range.clone();
        self.pump();
        Ok(())
    }

    /// Apply a free-form edit on behalf of the user or host.
    pub fn edit(&mut self, range: Range, text: &str) -> Result<ContentChange, BufferError> {
        let change = self.buffer.apply_edit(range, text, EditOrigin::External)?;
        self.pump();
        Ok(change)
    }

    /// Decide whether a change could only have come from [`apply`] or from
    /// the one-time placeholder removal.
    ///
    /// Heuristic, in priority order: a removed-character count equal to the
    /// placeholder's length is taken as the placeholder removal; then the
    /// edit's origin tag decides. A user edit elsewhere that happens to
    /// remove exactly that many characters is misclassified as internal;
    /// that false positive is an accepted limitation of the heuristic, not
    /// a bug to fix here.
    ///
    /// [`apply`]: SyncSession::apply
    pub fn change_is_internal(&self, change: &ContentChange) -> bool {
        if change.removed_chars == PLACEHOLDER_TEXT.chars().count() {
            return true;
        }
        matches!(
            change.origin,
            EditOrigin::Internal | EditOrigin::PlaceholderRemoval
        )
    }

    /// True when the change's line span falls inside the composition's line
    /// bounds. For a deletion the upper bound widens by the number of lines
    /// removed, so a deletion that collapses the composition still counts.
    pub fn is_within_composition(&self, change: &ContentChange) -> bool {
        let Some(range) = self.composition_range else {
            return false;
        };
        let start_line = range.start.line;
        let end_line = range.end.line;

        let within = change.range.start.line >= start_line && change.range.end.line <= end_line;

        let mut deletion_within = false;
        if change.is_deletion() {
            let lines_deleted = change.range.line_span();
            deletion_within = change.range.start.line >= start_line
                && change.range.end.line <= end_line + lines_deleted;
        }

        within || deletion_within
    }

    /// Observe one change from the buffer's feed and advance the state
    /// machine: an external change inside the composition ends the session.
    pub fn observe(&mut self, change: &ContentChange) {
        if self.state == SyncState::Ended {
            return;
        }
        if self.is_within_composition(change) && !self.change_is_internal(change) {
            self.state = SyncState::Ended;
            self.events.push_back(SyncEvent::SyncEnded);
            self.notifier.notify(composition_ended());
        }
    }

    /// Drain events queued during observation.
    ///
    /// Delivery is deliberately deferred to here rather than raised inside
    /// [`observe`]: the host drains after its own change dispatch finishes,
    /// so the sync-ended signal never lands mid-propagation.
    ///
    /// [`observe`]: SyncSession::observe
    pub fn take_events(&mut self) -> Vec<SyncEvent> {
        self.events.drain(..).collect()
    }

    fn pump(&mut self) {
        for change in self.buffer.drain_changes() {
            self.observe(&change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::{DbRp, TagValue};
    use proptest::prelude::*;

    fn cpu_selection() -> Selection {
        Selection {
            measurement: Some("cpu".to_string()),
            dbrp: Some(DbRp {
                database: "telegraf".to_string(),
                retention_policy: "autogen".to_string(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_apply_clears_placeholder_and_inserts() {
        let mut session = SyncSession::new();
        session.apply(&cpu_selection()).unwrap();
        assert_eq!(session.text(), "SELECT *\nFROM telegraf.autogen.\"cpu\"\n");
        let range = session.composition_range().unwrap();
        assert_eq!(range.start.line, 1);
        assert_eq!(range.end.line, 2);
        assert!(session.is_synced());
    }

    #[test]
    fn test_apply_is_idempotent_over_managed_region() {
        let mut session = SyncSession::new();
        let selection = cpu_selection();
        session.apply(&selection).unwrap();
        let first = session.text();
        let first_range = session.composition_range().unwrap();
        session.apply(&selection).unwrap();
        assert_eq!(session.text(), first);
        assert_eq!(session.composition_range().unwrap(), first_range);
    }

    #[test]
    fn test_shrinking_composition_leaves_no_orphans() {
        let mut session = SyncSession::new();
        let mut selection = cpu_selection();
        selection.fields = vec!["a_very_long_field_name".to_string()];
        session.apply(&selection).unwrap();

        selection.fields.clear();
        session.apply(&selection).unwrap();
        assert_eq!(session.text(), "SELECT *\nFROM telegraf.autogen.\"cpu\"\n");
    }

    #[test]
    fn test_self_inflicted_edits_keep_sync() {
        let mut session = SyncSession::new();
        session.apply(&cpu_selection()).unwrap();
        let mut selection = cpu_selection();
        selection.fields = vec!["usage_user".to_string()];
        session.apply(&selection).unwrap();
        assert!(session.is_synced());
        assert!(session.take_events().is_empty());
    }

    #[test]
    fn test_external_edit_inside_composition_ends_sync() {
        let mut session = SyncSession::new();
        session.apply(&cpu_selection()).unwrap();
        // Delete one character from the FROM line.
        session.edit(Range::new(2, 1, 2, 2), "").unwrap();
        assert_eq!(session.state(), SyncState::Ended);
        assert_eq!(session.take_events(), vec![SyncEvent::SyncEnded]);
    }

    #[test]
    fn test_external_edit_below_composition_keeps_sync() {
        let mut session = SyncSession::new();
        session.apply(&cpu_selection()).unwrap();
        // Type on the free line after the composition.
        session.edit(Range::new(3, 1, 3, 1), "-- my note").unwrap();
        assert!(session.is_synced());
        assert!(session.take_events().is_empty());
    }

    #[test]
    fn test_ended_state_is_terminal() {
        let mut session = SyncSession::new();
        session.apply(&cpu_selection()).unwrap();
        session.edit(Range::new(1, 1, 1, 2), "").unwrap();
        assert_eq!(session.state(), SyncState::Ended);
        session.take_events();

        // Further edits, internal-looking or not, never resurrect sync and
        // never produce a second event.
        session.edit(Range::new(1, 1, 1, 1), "x").unwrap();
        assert_eq!(session.state(), SyncState::Ended);
        assert!(session.take_events().is_empty());
    }

    #[test]
    fn test_placeholder_length_deletion_is_classified_internal() {
        let mut session = SyncSession::new();
        session.apply(&cpu_selection()).unwrap();
        let change = ContentChange {
            range: Range::new(1, 1, 1, 1),
            text: String::new(),
            removed_chars: PLACEHOLDER_TEXT.chars().count(),
            origin: EditOrigin::External,
        };
        // Accepted false positive of the count heuristic.
        assert!(session.change_is_internal(&change));
    }

    #[test]
    fn test_deletion_collapsing_composition_is_within() {
        let mut session = SyncSession::new();
        session.apply(&cpu_selection()).unwrap();
        // Composition spans lines 1-2; delete lines 2-3 entirely.
        let change = ContentChange {
            range: Range::new(2, 1, 3, 1),
            text: String::new(),
            removed_chars: 28,
            origin: EditOrigin::External,
        };
        assert!(session.is_within_composition(&change));
    }

    #[test]
    fn test_no_composition_range_means_nothing_is_within() {
        let session = SyncSession::new();
        let change = ContentChange {
            range: Range::new(1, 1, 1, 2),
            text: "x".to_string(),
            removed_chars: 1,
            origin: EditOrigin::External,
        };
        assert!(!session.is_within_composition(&change));
    }

    fn arb_selection() -> impl Strategy<Value = Selection> {
        let ident = "[a-z][a-z0-9_]{0,8}";
        (
            proptest::collection::vec(ident, 0..4),
            proptest::option::of(ident),
            proptest::collection::vec((ident, ident), 0..4),
        )
            .prop_map(|(fields, measurement, tags)| Selection {
                fields,
                measurement,
                tag_values: tags
                    .into_iter()
                    .map(|(key, value)| TagValue { key, value })
                    .collect(),
                ..Default::default()
            })
    }

    proptest! {
        // After any apply, every edit whose line span lies inside the
        // just-written region is within the composition.
        #[test]
        fn edits_inside_applied_region_are_contained(
            selection in arb_selection(),
            line_seed in 0usize..16,
            span_seed in 0usize..16,
            column in 1usize..40,
            text in "[a-z]{0,5}",
        ) {
            let mut session = SyncSession::new();
            session.apply(&selection).unwrap();
            let region = session.composition_range().unwrap();

            // Pick a line span fully inside [start, end].
            let lines = region.end.line - region.start.line + 1;
            let start_line = region.start.line + line_seed % lines;
            let end_line = start_line + span_seed % (region.end.line - start_line + 1);

            let change = ContentChange {
                range: Range::new(start_line, column, end_line, column),
                text,
                removed_chars: 1,
                origin: EditOrigin::External,
            };
            prop_assert!(session.is_within_composition(&change));
        }
    }

    #[test]
    fn test_should_apply_gates_on_diff_and_time_range() {
        let mut session = SyncSession::new();
        let selection = cpu_selection();
        session.apply(&selection).unwrap();

        let empty = SelectionDiff::default();
        assert!(!session.should_apply(&empty, &selection.time_range));

        let moved = TimeRange {
            lower: "now() - 24h".to_string(),
            upper: None,
        };
        assert!(session.should_apply(&empty, &moved));
    }
}
