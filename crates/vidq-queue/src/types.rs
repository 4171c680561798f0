/// A value that can mark end-of-stream on a queue.
///
/// Consumers read until they see the marker; [`crate::shutdown::send_completion_marker`]
/// places one on the queue.
pub trait EndOfStream: Sized {
    fn end_of_stream() -> Self;
    fn is_end_of_stream(&self) -> bool;
}

/// Queue payload with a reserved stop marker that can never collide with an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T> {
    Item(T),
    Stop,
}

impl<T> Message<T> {
    pub fn is_stop(&self) -> bool {
        matches!(self, Message::Stop)
    }

    pub fn into_item(self) -> Option<T> {
        match self {
            Message::Item(item) => Some(item),
            Message::Stop => None,
        }
    }
}

impl<T> EndOfStream for Message<T> {
    fn end_of_stream() -> Self {
        Message::Stop
    }

    fn is_end_of_stream(&self) -> bool {
        self.is_stop()
    }
}

/// `None` is the marker, for queues that already carry `Option<T>`.
impl<T> EndOfStream for Option<T> {
    fn end_of_stream() -> Self {
        None
    }

    fn is_end_of_stream(&self) -> bool {
        self.is_none()
    }
}

/// Shutdown lifecycle of a queue, as driven by the operations in [`crate::shutdown`].
///
/// `Open` → `Closing` when a marker is sent or a drain starts; `Closing` → `Drained` when a
/// drain observes the queue empty with no further writes expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Open,
    Closing,
    Drained,
}

impl QueueState {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            QueueState::Open => 0,
            QueueState::Closing => 1,
            QueueState::Drained => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => QueueState::Open,
            1 => QueueState::Closing,
            _ => QueueState::Drained,
        }
    }
}
