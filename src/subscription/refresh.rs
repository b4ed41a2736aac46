//! Caller-supplied refresh run on every change notification.

use async_trait::async_trait;

use crate::error::Result;
use crate::feed::ChangeNotification;

/// Re-query and apply step triggered by a change notification.
///
/// `refresh` may take as long as it needs and is never cancelled. `apply`
/// is only called while the subscription that triggered the refresh is
/// still running, and it must not call back into the manager.
#[async_trait]
pub trait Refresher: Send + Sync + 'static {
    type Output: Send + 'static;

    async fn refresh(&self, change: &ChangeNotification) -> Result<Self::Output>;

    async fn apply(&self, output: Self::Output);
}
