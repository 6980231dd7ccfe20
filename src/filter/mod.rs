//! Streaming tag-suppressing filter.
//!
//! The filter consumes an incremental, arbitrarily-chunked stream of text,
//! removes embedded marker regions from what the client sees, and extracts
//! each region's inner text as a payload. Its central guarantee is chunk
//! invariance: for any fragmentation of the input - down to one character
//! per fragment - the concatenated clean output and the ordered payload
//! list are identical to processing the whole text at once.
//!
//! The implementation is an explicit two-state machine
//! ([`Passthrough`](FilterState::Passthrough) /
//! [`InsideMarker`](FilterState::InsideMarker)) over a bounded retention
//! buffer, replacing the per-call-site lookahead heuristics this design
//! grew out of.

use crate::marker::{MarkerKind, MarkerRegistry, RawPayload};
use std::sync::Arc;
use tracing::debug;

/// State of the filter between fragments.
///
/// Exactly one state exists per active stream; it is exclusively owned by
/// the [`StreamFilter`] for that stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Forwarding text; a suffix may be withheld as a possible marker start.
    Passthrough,

    /// Inside a marker region; nothing is forwarded until the close
    /// delimiter arrives.
    InsideMarker(MarkerKind),
}

/// Text and payloads produced by one filter step.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FilterOutput {
    /// Clean text safe to forward to the client, in input order.
    pub clean: String,

    /// Payloads extracted from marker regions completed in this step.
    pub payloads: Vec<RawPayload>,
}

impl FilterOutput {
    /// Returns `true` if this step produced neither text nor payloads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clean.is_empty() && self.payloads.is_empty()
    }
}

/// Ordered buffer of recently seen, not-yet-emitted characters.
///
/// In `Passthrough` the buffer holds at most the ambiguous suffix (a strict
/// prefix of some open delimiter), so its length stays below the longest
/// open delimiter without an explicit cap. In `InsideMarker` it accumulates
/// the region's inner text; inner payloads are modest text blocks, so no
/// artificial cap is applied there either.
#[derive(Debug, Clone, Default)]
struct RetentionBuffer {
    buf: String,
}

impl RetentionBuffer {
    fn as_str(&self) -> &str {
        &self.buf
    }

    fn len(&self) -> usize {
        self.buf.len()
    }

    fn push_str(&mut self, fragment: &str) {
        self.buf.push_str(fragment);
    }

    /// Removes and returns the first `at` bytes, keeping the rest.
    fn split_off_front(&mut self, at: usize) -> String {
        let rest = self.buf.split_off(at);
        std::mem::replace(&mut self.buf, rest)
    }

    /// Drops the first `n` bytes.
    fn discard_front(&mut self, n: usize) {
        self.buf.drain(..n);
    }

    /// Takes the entire buffer, leaving it empty.
    fn take(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }
}

/// The streaming tag-suppressing state machine.
///
/// All transitions are synchronous and never suspend; the filter holds no
/// locks and is owned by exactly one stream.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tagflow_rs::{MarkerRegistry, StreamFilter};
///
/// let mut filter = StreamFilter::new(Arc::new(MarkerRegistry::default()));
/// let out = filter.push(r#"Hi <photo>{"query":"Louvre"}</photo> there"#);
/// assert_eq!(out.clean, "Hi  there");
/// assert_eq!(out.payloads.len(), 1);
/// ```
#[derive(Debug)]
pub struct StreamFilter {
    /// Shared, immutable marker definitions.
    registry: Arc<MarkerRegistry>,
    /// Current state.
    state: FilterState,
    /// Withheld text (ambiguous suffix or marker inner text).
    held: RetentionBuffer,
    /// Count of marker regions completed so far.
    extracted: u64,
}

impl StreamFilter {
    /// Creates a filter over the given marker registry.
    #[must_use]
    pub fn new(registry: Arc<MarkerRegistry>) -> Self {
        Self {
            registry,
            state: FilterState::Passthrough,
            held: RetentionBuffer::default(),
            extracted: 0,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> FilterState {
        self.state
    }

    /// Returns the number of marker regions completed so far.
    #[must_use]
    pub const fn payloads_extracted(&self) -> u64 {
        self.extracted
    }

    /// Feeds one fragment through the state machine.
    ///
    /// Returns the clean text that became safe to forward and any payloads
    /// whose marker regions completed within this step. Fragment boundaries
    /// carry no meaning: a delimiter may arrive split across any number of
    /// calls, including one byte at a time.
    pub fn push(&mut self, fragment: &str) -> FilterOutput {
        let mut out = FilterOutput::default();
        self.held.push_str(fragment);
        self.drain(&mut out);
        out
    }

    /// Signals end of stream and flushes whatever is still withheld.
    ///
    /// Policy for an unterminated marker: the region is reconstructed
    /// verbatim (open delimiter plus buffered inner text) and emitted as
    /// plain clean text rather than silently dropped. A trailing strict
    /// prefix of an open delimiter is flushed the same way. The filter is
    /// reusable for a new stream afterwards.
    pub fn finish(&mut self) -> FilterOutput {
        let mut out = FilterOutput::default();
        match self.state {
            FilterState::Passthrough => {
                out.clean = self.held.take();
            }
            FilterState::InsideMarker(kind) => {
                debug!(marker = %kind, "stream ended inside marker, flushing as text");
                if let Some(def) = self.registry.get(kind) {
                    out.clean.push_str(&def.open);
                }
                out.clean.push_str(&self.held.take());
                self.state = FilterState::Passthrough;
            }
        }
        out
    }

    /// Runs transitions until no further progress is possible.
    ///
    /// Each completed close delimiter carries the remainder forward through
    /// `Passthrough` again, so a marker may begin immediately after another
    /// ends within a single fragment.
    fn drain(&mut self, out: &mut FilterOutput) {
        loop {
            match self.state {
                FilterState::Passthrough => {
                    if let Some((at, def)) = self.registry.find_open(self.held.as_str()) {
                        let kind = def.kind;
                        let open_len = def.open.len();
                        debug!(marker = %kind, "open delimiter seen, suppressing stream");
                        let before = self.held.split_off_front(at);
                        out.clean.push_str(&before);
                        self.held.discard_front(open_len);
                        self.state = FilterState::InsideMarker(kind);
                        continue;
                    }
                    // No complete open delimiter: withhold only the suffix
                    // that could still become one.
                    let keep = self.registry.ambiguous_suffix_len(self.held.as_str());
                    let split = self.held.len() - keep;
                    if split > 0 {
                        out.clean.push_str(&self.held.split_off_front(split));
                    }
                    break;
                }
                FilterState::InsideMarker(kind) => {
                    let Some(def) = self.registry.get(kind) else {
                        // Unreachable for kinds this filter entered; recover
                        // by reprocessing the held text as plain stream.
                        self.state = FilterState::Passthrough;
                        continue;
                    };
                    if let Some(at) = self.held.as_str().find(def.close.as_str()) {
                        let close_len = def.close.len();
                        debug!(marker = %kind, "close delimiter seen, resuming stream");
                        let inner = self.held.split_off_front(at);
                        out.payloads.push(RawPayload::new(kind, &inner));
                        self.extracted += 1;
                        self.held.discard_front(close_len);
                        self.state = FilterState::Passthrough;
                        continue;
                    }
                    break;
                }
            }
        }
    }
}

/// Filters a complete text in one pass.
///
/// Convenience wrapper over [`StreamFilter`] for non-streaming callers:
/// returns the clean text and all extracted payloads, applying the same
/// end-of-stream flush policy.
#[must_use]
pub fn filter_text(registry: &Arc<MarkerRegistry>, text: &str) -> FilterOutput {
    let mut filter = StreamFilter::new(Arc::clone(registry));
    let mut out = filter.push(text);
    let tail = filter.finish();
    out.clean.push_str(&tail.clean);
    out.payloads.extend(tail.payloads);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_filter() -> StreamFilter {
        StreamFilter::new(Arc::new(MarkerRegistry::default()))
    }

    fn feed_chars(filter: &mut StreamFilter, text: &str) -> FilterOutput {
        let mut out = FilterOutput::default();
        for ch in text.chars() {
            let step = filter.push(&ch.to_string());
            out.clean.push_str(&step.clean);
            out.payloads.extend(step.payloads);
        }
        out
    }

    #[test]
    fn test_passthrough_plain_text() {
        let mut filter = new_filter();
        let out = filter.push("just some prose");
        assert_eq!(out.clean, "just some prose");
        assert!(out.payloads.is_empty());
        assert_eq!(filter.state(), FilterState::Passthrough);
    }

    #[test]
    fn test_single_fragment_with_marker() {
        let mut filter = new_filter();
        let out = filter.push(r#"Hello <photo>{"query":"q"}</photo> world"#);
        assert_eq!(out.clean, "Hello  world");
        assert_eq!(out.payloads.len(), 1);
        assert_eq!(out.payloads[0].kind, MarkerKind::Photo);
        assert_eq!(out.payloads[0].raw, r#"{"query":"q"}"#);
    }

    #[test]
    fn test_char_by_char_matches_single_fragment() {
        let text = r#"Hello <trip_update>{"field":"f","value":1}</trip_update> world"#;

        let mut whole = new_filter();
        let mut expected = whole.push(text);
        let tail = whole.finish();
        expected.clean.push_str(&tail.clean);

        let mut chars = new_filter();
        let mut actual = feed_chars(&mut chars, text);
        let tail = chars.finish();
        actual.clean.push_str(&tail.clean);

        assert_eq!(actual.clean, expected.clean);
        assert_eq!(actual.payloads, expected.payloads);
        assert_eq!(actual.clean, "Hello  world");
    }

    #[test]
    fn test_ambiguous_prefix_withheld_then_released() {
        let mut filter = new_filter();
        let out = filter.push("text <tri");
        // "<tri" could still become "<trip_update>"; withhold it.
        assert_eq!(out.clean, "text ");

        // Divergence releases the withheld suffix.
        let out = filter.push("cky");
        assert_eq!(out.clean, "<tricky");
        assert_eq!(filter.state(), FilterState::Passthrough);
    }

    #[test]
    fn test_ambiguous_prefix_completes_into_marker() {
        let mut filter = new_filter();
        let out = filter.push("see <pho");
        assert_eq!(out.clean, "see ");

        let out = filter.push("to>hidden</photo> done");
        assert_eq!(out.clean, " done");
        assert_eq!(out.payloads.len(), 1);
        assert_eq!(out.payloads[0].raw, "hidden");
    }

    #[test]
    fn test_inside_marker_emits_nothing() {
        let mut filter = new_filter();
        filter.push("<trip_update>");
        assert_eq!(filter.state(), FilterState::InsideMarker(MarkerKind::TripUpdate));

        let out = filter.push("lots of payload text with no close");
        assert!(out.clean.is_empty());
        assert!(out.payloads.is_empty());
    }

    #[test]
    fn test_open_delimiter_inside_marker_is_inner_text() {
        let mut filter = new_filter();
        let out = filter.push("<trip_update>a<photo>b</trip_update>c");
        assert_eq!(out.clean, "c");
        assert_eq!(out.payloads.len(), 1);
        assert_eq!(out.payloads[0].raw, "a<photo>b");
        assert_eq!(out.payloads[0].kind, MarkerKind::TripUpdate);
    }

    #[test]
    fn test_adjacent_markers_in_one_fragment() {
        let mut filter = new_filter();
        let out = filter.push("<photo>one</photo><trip_update>two</trip_update>tail");
        assert_eq!(out.clean, "tail");
        assert_eq!(out.payloads.len(), 2);
        assert_eq!(out.payloads[0].kind, MarkerKind::Photo);
        assert_eq!(out.payloads[0].raw, "one");
        assert_eq!(out.payloads[1].kind, MarkerKind::TripUpdate);
        assert_eq!(out.payloads[1].raw, "two");
    }

    #[test]
    fn test_two_marker_types_in_order() {
        let text = r#"a <trip_update>{"field":"x","value":1}</trip_update> b <photo>{"query":"q"}</photo> c"#;
        let mut filter = new_filter();
        let out = feed_chars(&mut filter, text);
        assert_eq!(out.clean, "a  b  c");
        assert_eq!(out.payloads.len(), 2);
        assert_eq!(out.payloads[0].kind, MarkerKind::TripUpdate);
        assert_eq!(out.payloads[1].kind, MarkerKind::Photo);
    }

    #[test]
    fn test_finish_flushes_plain_tail() {
        let mut filter = new_filter();
        let out = filter.push("ends with <t");
        assert_eq!(out.clean, "ends with ");
        let tail = filter.finish();
        assert_eq!(tail.clean, "<t");
    }

    #[test]
    fn test_finish_flushes_unterminated_marker_verbatim() {
        let mut filter = new_filter();
        let out = filter.push("before <photo>half a payload");
        assert_eq!(out.clean, "before ");
        let tail = filter.finish();
        assert_eq!(tail.clean, "<photo>half a payload");
        assert!(tail.payloads.is_empty());
        // Filter is reusable after finish.
        assert_eq!(filter.state(), FilterState::Passthrough);
    }

    #[test]
    fn test_finish_on_clean_state_is_empty() {
        let mut filter = new_filter();
        filter.push("all emitted ");
        let tail = filter.finish();
        assert!(tail.is_empty());
    }

    #[test]
    fn test_empty_fragments_are_noops() {
        let mut filter = new_filter();
        assert!(filter.push("").is_empty());
        filter.push("<pho");
        assert!(filter.push("").is_empty());
        let out = filter.push("to>x</photo>");
        assert_eq!(out.payloads.len(), 1);
    }

    #[test]
    fn test_multibyte_text_around_markers() {
        let text = "café ☕ <photo>über</photo> naïve";
        let mut filter = new_filter();
        let out = feed_chars(&mut filter, text);
        assert_eq!(out.clean, "café ☕  naïve");
        assert_eq!(out.payloads[0].raw, "über");
    }

    #[test]
    fn test_marker_split_at_every_boundary() {
        let text = r#"x<trip_update>{"field":"f","value":2}</trip_update>y"#;
        for split in 1..text.len() {
            if !text.is_char_boundary(split) {
                continue;
            }
            let mut filter = new_filter();
            let mut out = filter.push(&text[..split]);
            let step = filter.push(&text[split..]);
            out.clean.push_str(&step.clean);
            out.payloads.extend(step.payloads);
            let tail = filter.finish();
            out.clean.push_str(&tail.clean);

            assert_eq!(out.clean, "xy", "split at byte {split}");
            assert_eq!(out.payloads.len(), 1, "split at byte {split}");
            assert_eq!(out.payloads[0].raw, r#"{"field":"f","value":2}"#);
        }
    }

    #[test]
    fn test_extracted_counter() {
        let mut filter = new_filter();
        filter.push("<photo>a</photo><photo>b</photo>");
        assert_eq!(filter.payloads_extracted(), 2);
    }

    #[test]
    fn test_filter_text_helper() {
        let registry = Arc::new(MarkerRegistry::default());
        let out = filter_text(&registry, "a<photo>p</photo>b<pho");
        assert_eq!(out.clean, "ab<pho");
        assert_eq!(out.payloads.len(), 1);
    }
}
