use crate::domain::ports::{AssetSource, PaymentQr};
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::warn;

/// Reads the payment QR image from disk on every request, so replacing the file
/// takes effect without a restart.
#[derive(Debug, Clone)]
pub struct FileAssetSource {
    qr_path: PathBuf,
}

impl FileAssetSource {
    pub fn new(qr_path: impl Into<PathBuf>) -> Self {
        Self {
            qr_path: qr_path.into(),
        }
    }
}

#[async_trait]
impl AssetSource for FileAssetSource {
    async fn payment_qr(&self) -> Result<PaymentQr> {
        match tokio::fs::read(&self.qr_path).await {
            Ok(bytes) => Ok(PaymentQr {
                path: self.qr_path.clone(),
                bytes,
            }),
            Err(err) => {
                warn!(path = %self.qr_path.display(), error = %err, "payment QR unavailable");
                Err(EscrowError::Asset(format!(
                    "{}: {}",
                    self.qr_path.display(),
                    err
                )))
            }
        }
    }
}
