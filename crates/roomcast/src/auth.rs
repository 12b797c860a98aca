//! Authentication hook for the connection handshake.
//!
//! roomcast doesn't authenticate anyone itself. The server calls an
//! [`Authenticator`] with the token from the client's handshake and uses
//! the [`Identity`] it returns for the rest of the connection.

use roomcast_protocol::Identity;

/// Errors an [`Authenticator`] can report.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token was invalid, expired, or rejected.
    #[error("authentication failed: {0}")]
    Rejected(String),
}

/// Validates a client's auth token and returns their identity.
///
/// `Send + Sync + 'static` because one authenticator is shared by every
/// connection task for the life of the server.
///
/// # Example
///
/// ```rust
/// use roomcast::{AuthError, Authenticator};
/// use roomcast_protocol::Identity;
///
/// /// Accepts `user_id:display_name` tokens. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
///         let (user_id, name) = token
///             .split_once(':')
///             .ok_or_else(|| AuthError::Rejected("expected user_id:name".into()))?;
///         Ok(Identity::new(user_id, name))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token.
    ///
    /// # Returns
    /// - `Ok(Identity)`: the user id and display name to stamp on messages
    /// - `Err(AuthError::Rejected)`: the token is invalid
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Identity, AuthError>> + Send;
}
