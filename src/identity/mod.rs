//! Client identity
//!
//! A client is recognised across reconnects and restarts by a token kept in
//! local storage. The remote uses it to rebind a new connection to the seat
//! the client held before.
//!
//! Storage trouble never stops the client: it gets a token that lives as
//! long as the process, and every restart looks like a brand new player.
mod store;
mod token;

use log::{info, warn};
use rand::thread_rng;
use std::path::Path;
pub use store::{KeyValueStore, MemoryStore, SledStore, StorageUnavailable};
pub use token::ClientIdentity;

pub const IDENTITY_KEY: &str = "playerId";

/// Where the identity token came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityOrigin {
    /// generated now and persisted
    Created,
    /// read back from a previous run
    Restored,
    /// generated now, persistence failed
    Ephemeral,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub token: ClientIdentity,
    pub origin: IdentityOrigin,
}

impl Identity {
    /// A restored identity may own a seat in a running game.
    pub fn is_restored(&self) -> bool {
        self.origin == IdentityOrigin::Restored
    }

    fn ephemeral() -> Self {
        Identity {
            token: ClientIdentity::random(&mut thread_rng()),
            origin: IdentityOrigin::Ephemeral,
        }
    }
}

/// Read the stored identity, or create and store a new one.
pub fn get_or_create_identity<S>(store: &S) -> Identity
where
    S: KeyValueStore + ?Sized,
{
    match store.get(IDENTITY_KEY) {
        Ok(Some(token)) if !token.is_empty() => {
            info!("restored client identity {}", token);
            Identity {
                token: ClientIdentity::from_token(token),
                origin: IdentityOrigin::Restored,
            }
        }
        Ok(_) => {
            let token = ClientIdentity::random(&mut thread_rng());
            match store.set(IDENTITY_KEY, token.as_str()) {
                Ok(()) => {
                    info!("created client identity {}", token);
                    Identity {
                        token,
                        origin: IdentityOrigin::Created,
                    }
                }
                Err(e) => {
                    warn!("{}, identity {} will not survive a restart", e, token);
                    Identity {
                        token,
                        origin: IdentityOrigin::Ephemeral,
                    }
                }
            }
        }
        Err(e) => {
            let identity = Identity::ephemeral();
            warn!("{}, using ephemeral identity {}", e, identity.token);
            identity
        }
    }
}

/// Open the on-disk store at `path` and get the identity from it.
pub fn open_identity(path: &Path) -> Identity {
    match SledStore::open(path) {
        Ok(store) => {
            let identity = get_or_create_identity(&store);
            if identity.is_restored() {
                if let Ok(Some(written_at)) = store.written_at(IDENTITY_KEY) {
                    info!("identity {} stored at unix time {}", identity.token, written_at);
                }
            }
            identity
        }
        Err(e) => {
            let identity = Identity::ephemeral();
            warn!(
                "storage unavailable ({}), using ephemeral identity {}",
                e, identity.token
            );
            identity
        }
    }
}

#[cfg(test)]
mod test_identity {
    use super::*;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _: &str) -> Result<Option<String>, StorageUnavailable> {
            Err(StorageUnavailable("disk on fire".to_string()))
        }

        fn set(&self, _: &str, _: &str) -> Result<(), StorageUnavailable> {
            Err(StorageUnavailable("disk on fire".to_string()))
        }
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _: &str) -> Result<Option<String>, StorageUnavailable> {
            Ok(None)
        }

        fn set(&self, _: &str, _: &str) -> Result<(), StorageUnavailable> {
            Err(StorageUnavailable("read only".to_string()))
        }
    }

    #[test]
    fn test_create_then_restore() {
        let store = MemoryStore::new();
        let first = get_or_create_identity(&store);
        assert_eq!(first.origin, IdentityOrigin::Created);
        let second = get_or_create_identity(&store);
        assert_eq!(second.origin, IdentityOrigin::Restored);
        assert_eq!(first.token, second.token);
        assert!(second.is_restored());
    }

    #[test]
    fn test_existing_token() {
        let store = MemoryStore::new();
        store.set(IDENTITY_KEY, "p-xyz").unwrap();
        let identity = get_or_create_identity(&store);
        assert_eq!(identity.token.as_str(), "p-xyz");
        assert_eq!(identity.origin, IdentityOrigin::Restored);
    }

    #[test]
    fn test_storage_unavailable() {
        let a = get_or_create_identity(&BrokenStore);
        let b = get_or_create_identity(&BrokenStore);
        assert_eq!(a.origin, IdentityOrigin::Ephemeral);
        assert_ne!(a.token, b.token);
        let c = get_or_create_identity(&ReadOnlyStore);
        assert_eq!(c.origin, IdentityOrigin::Ephemeral);
    }

    #[test]
    fn test_sled_backed() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledStore::with_db(db).unwrap();
        let first = get_or_create_identity(&store);
        assert_eq!(first.origin, IdentityOrigin::Created);
        let second = get_or_create_identity(&store);
        assert_eq!(second.origin, IdentityOrigin::Restored);
        assert_eq!(first.token, second.token);
    }
}
