pub mod email;
pub mod models;
pub use email::*;
pub use models::*;

use async_trait::async_trait;

use crate::core::NotifyError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}
