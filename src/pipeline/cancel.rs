use tokio_util::sync::CancellationToken;

/// Cooperative cancellation shared by every stage of a pipeline and by the
/// subscription driving it.
///
/// Tokens form a tree: cancelling a token cancels every [`child_token`]
/// created from it, while cancelling a child leaves its parent untouched.
/// Stages that run an inner pipeline they may need to stop on their own (a
/// zip's secondary source, one resubscribe attempt) give it a child token.
/// A dropped child detaches from its parent.
///
/// [`child_token`]: CancelToken::child_token
#[derive(Clone, Default, Debug)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled together with `self`. Already cancelled if `self` is.
    pub fn child_token(&self) -> CancelToken {
        CancelToken {
            inner: self.inner.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }
}
