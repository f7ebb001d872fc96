use crate::Error;

/// The settlement state of a promise.
///
/// A promise starts out `Pending` and moves exactly once to either
/// `Fulfilled` or `Rejected`. Both are terminal: a settle request against a
/// non-pending state is a silent no-op, which is what makes resolve and
/// reject idempotent and lets a cancellation-triggered reject race
/// harmlessly against a normal resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State<T> {
    /// Initial state, neither fulfilled nor rejected.
    Pending,
    /// The operation completed successfully.
    Fulfilled(T),
    /// The operation failed.
    Rejected(Error),
}

impl<T> State<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, State::Pending)
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, State::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, State::Rejected(_))
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// The fulfilled value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            State::Fulfilled(value) => Some(value),
            _ => None,
        }
    }

    /// The rejection reason, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            State::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let pending: State<i32> = State::Pending;
        assert!(pending.is_pending());
        assert!(!pending.is_settled());
        assert_eq!(pending.value(), None);
        assert_eq!(pending.error(), None);

        let fulfilled = State::Fulfilled(7);
        assert!(fulfilled.is_fulfilled());
        assert!(fulfilled.is_settled());
        assert_eq!(fulfilled.value(), Some(&7));

        let rejected: State<i32> = State::Rejected(Error::failure("boom"));
        assert!(rejected.is_rejected());
        assert!(rejected.is_settled());
        assert_eq!(rejected.error(), Some(&Error::failure("boom")));
    }
}
