//! Periodic drive rescan service.

use arbor_service::{BoxFuture, Service, ServiceError};

use crate::item::TreeItem;

/// Re-enumerates block devices by refreshing the root item, so drives
/// appearing or vanishing show up without a manual reload.
pub(crate) struct DriveRescan {
    root: TreeItem,
}

impl DriveRescan {
    pub(crate) fn new(root: TreeItem) -> Self {
        Self { root }
    }
}

impl Service for DriveRescan {
    fn name(&self) -> &'static str {
        "drive-rescan"
    }

    fn tick(&self) -> BoxFuture<'_, Result<(), ServiceError>> {
        let root = self.root.clone();
        Box::pin(async move {
            // drive enumeration shells out; keep it off the runtime
            tokio::task::spawn_blocking(move || root.refresh())
                .await
                .map_err(|err| ServiceError::tick(err.to_string()))
        })
    }
}
