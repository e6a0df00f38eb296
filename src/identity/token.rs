use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt::{Display, Formatter};

const TOKEN_PREFIX: &str = "p-";
const TOKEN_LENGTH: usize = 16;

/// Durable token identifying this client across reconnects.
///
/// Only needs to avoid collisions between a handful of clients
/// sharing a room, so `thread_rng` alphanumerics are plenty.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub(crate) fn random<R: Rng>(rng: &mut R) -> Self {
        let mut token = String::with_capacity(TOKEN_PREFIX.len() + TOKEN_LENGTH);
        token.push_str(TOKEN_PREFIX);
        token.extend(rng.sample_iter(&Alphanumeric).take(TOKEN_LENGTH).map(char::from));
        ClientIdentity(token)
    }

    /// Wrap a token received from storage or from the user.
    pub fn from_token(token: impl Into<String>) -> Self {
        ClientIdentity(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClientIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test_identity_token {
    use super::*;
    use rand::thread_rng;
    use std::collections::HashSet;

    #[test]
    fn test_random_gen() {
        let mut rng = thread_rng();
        let tokens: HashSet<ClientIdentity> =
            (0..1000).map(|_| ClientIdentity::random(&mut rng)).collect();
        assert_eq!(tokens.len(), 1000);
        for token in tokens {
            assert!(token.as_str().starts_with(TOKEN_PREFIX));
            assert_eq!(token.as_str().len(), TOKEN_PREFIX.len() + TOKEN_LENGTH);
        }
    }

    #[test]
    fn test_from_token() {
        let token = ClientIdentity::from_token("p-abc");
        assert_eq!(token.as_str(), "p-abc");
        assert_eq!(token.to_string(), "p-abc");
    }
}
