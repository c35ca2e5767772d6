use sqlx::{AnyConnection, Connection};

use crate::error::ServiceError;

const SELECT_IMAGE: &str = "SELECT image_binary FROM blog_images WHERE id = ?";

/// Encoded images stored as BLOBs in the `blog_images` table.
///
/// Each lookup opens its own connection and closes it afterwards.
#[derive(Debug, Clone)]
pub struct BlobStore {
    url: String,
}

impl BlobStore {
    pub fn new(url: impl Into<String>) -> Self {
        sqlx::any::install_default_drivers();
        Self { url: url.into() }
    }

    pub async fn fetch(&self, id: i64) -> Result<Vec<u8>, ServiceError> {
        let mut conn = AnyConnection::connect(&self.url)
            .await
            .map_err(ServiceError::ServiceUnavailable)?;

        let row = sqlx::query_scalar::<_, Vec<u8>>(SELECT_IMAGE)
            .bind(id)
            .fetch_optional(&mut conn)
            .await;

        if let Err(err) = conn.close().await {
            tracing::debug!("closing database connection failed: {err}");
        }

        row.map_err(ServiceError::ServiceUnavailable)?
            .ok_or(ServiceError::NotFound(id))
    }
}
