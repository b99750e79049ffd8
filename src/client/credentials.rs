use parking_lot::RwLock;

/// Holds the client's access token for the session.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, credential: String);
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            credential: RwLock::new(Some(credential.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<String> {
        self.credential.read().clone()
    }

    fn set(&self, credential: String) {
        *self.credential.write() = Some(credential);
    }

    fn clear(&self) {
        *self.credential.write() = None;
    }
}
