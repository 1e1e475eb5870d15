//! The segment data model.

use bytes::Bytes;

use crate::ids::SegmentId;

/// One independently playable unit of encoded video.
///
/// Immutable once created; cloning is cheap because the payload is a
/// reference-counted [`Bytes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    id: SegmentId,
    payload: Bytes,
}

impl Segment {
    /// Wrap a freshly captured payload under a new random id.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self::with_id(SegmentId::new(), payload)
    }

    /// Build a segment with a known id (e.g. one parsed off the wire).
    pub fn with_id(id: SegmentId, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_assigns_fresh_ids() {
        let a = Segment::new(Bytes::from_static(b"one"));
        let b = Segment::new(Bytes::from_static(b"one"));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.payload(), b.payload());
    }

    #[test]
    fn with_id_keeps_id() {
        let id = SegmentId::new();
        let seg = Segment::with_id(id, vec![1u8, 2, 3]);
        assert_eq!(seg.id(), id);
        assert_eq!(seg.len(), 3);
        assert!(!seg.is_empty());
    }
}
