use plaza_core::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    /// Human-readable name, if the user has one
    pub handle: Option<String>,
}

/// Who is looking at the feed
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` when nobody is signed in
    async fn current_viewer(&self) -> Option<Identity>;
}

/// An identity fixed at startup (e.g. from command line arguments)
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    pub fn new(id: UserId, handle: Option<String>) -> Self {
        Self(Some(Identity { id, handle }))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_viewer(&self) -> Option<Identity> {
        self.0.clone()
    }
}
