//! Delivery of activation tokens to newly registered users.

use async_trait::async_trait;

use crate::error::UserResult;
use crate::models::User;

/// Sends the activation token to the user out of band.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivationNotifier: Send + Sync {
    async fn send_activation(&self, user: &User, token: &str) -> UserResult<()>;
}

/// Writes the delivery to the log instead of sending mail.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl ActivationNotifier for LoggingNotifier {
    async fn send_activation(&self, user: &User, token: &str) -> UserResult<()> {
        tracing::info!(
            user_id = user.id,
            email = %user.email,
            token,
            "Activation token issued"
        );
        Ok(())
    }
}
