use std::fmt::Debug;

/// An envelope for a single piece of work or a single result.
///
/// A `Message` carries the user payload plus two optional bits of routing
/// metadata: a free-form `kind` tag and an `order` key. The `order` key is
/// what [`Channel::sorted`](crate::channel::Channel::sorted) and
/// [`sorted`](crate::sort::sorted) use to reassemble results in submission
/// order; the caller is responsible for assigning unique, meaningful values
/// when ordering matters.
///
/// End-of-stream is *not* representable as a `Message`. The sentinel that
/// terminates [`Channel::messages`](crate::channel::Channel::messages) is a
/// separate variant of the crate-internal envelope type, so no `kind` value
/// is reserved and a worker can never accidentally forward a sentinel as
/// ordinary data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message<T> {
    /// The user payload.
    pub data: T,
    /// Optional tag describing the payload. Empty by default.
    pub kind: String,
    /// Optional sequence key used for ordered reassembly. `0` by default.
    pub order: u64,
}

impl<T> Message<T> {
    /// Creates a message wrapping `data` with an empty `kind` and `order` of 0.
    pub fn new(data: T) -> Self {
        Message {
            data,
            kind: String::new(),
            order: 0,
        }
    }

    /// Sets the `kind` tag of this message.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Sets the `order` key of this message.
    pub fn with_order(mut self, order: u64) -> Self {
        self.order = order;
        self
    }
}

/// What actually travels through a [`Channel`](crate::channel::Channel):
/// either a message or the end-of-stream sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Envelope<T> {
    Data(Message<T>),
    End,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let msg = Message::new(42);
        assert_eq!(42, msg.data);
        assert_eq!("", msg.kind);
        assert_eq!(0, msg.order);
    }

    #[test]
    fn test_builders() {
        let msg = Message::new("payload").with_kind("EVEN").with_order(7);
        assert_eq!("EVEN", msg.kind);
        assert_eq!(7, msg.order);
    }
}
