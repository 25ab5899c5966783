//! Fallback strategy: extract the locally installed copy.

use std::sync::Arc;

use async_trait::async_trait;

use pkgrelay_core::{AcquisitionResult, AssetRequest, LocalPackageRegistry, UnavailableReason};

use super::AcquisitionStrategy;

/// Streams the installed binary of an asset from the local registry.
///
/// Any installed version is accepted. A version that differs from the
/// request is logged and reported through `installed_version`; it is not
/// a failure.
pub struct LocalExtractionStrategy {
    registry: Arc<dyn LocalPackageRegistry>,
}

impl LocalExtractionStrategy {
    /// Create a strategy over `registry`.
    pub fn new(registry: Arc<dyn LocalPackageRegistry>) -> Self {
        Self { registry }
    }

    async fn extract(&self, request: &AssetRequest) -> Result<AcquisitionResult, UnavailableReason> {
        if !self.registry.is_installed(&request.asset_id).await? {
            return Err(UnavailableReason::NotInstalled);
        }
        let installed_version = self
            .registry
            .installed_version(&request.asset_id)
            .await?
            .ok_or(UnavailableReason::NotInstalled)?;

        if installed_version != request.version {
            tracing::warn!(
                target: "pkgrelay.acquire",
                asset_id = %request.asset_id,
                requested = %request.version,
                installed = %installed_version,
                "Installed version differs from request; relaying installed copy"
            );
        }

        let binary = self.registry.open_installed_binary(&request.asset_id).await?;
        Ok(AcquisitionResult::LocalStream {
            stream: binary.stream,
            length: binary.length,
            installed_version,
        })
    }
}

#[async_trait]
impl AcquisitionStrategy for LocalExtractionStrategy {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn acquire(&self, request: &AssetRequest) -> AcquisitionResult {
        self.extract(request)
            .await
            .unwrap_or_else(AcquisitionResult::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    use pkgrelay_core::{InstalledBinary, RegistryError};

    mock! {
        Registry {}

        #[async_trait]
        impl LocalPackageRegistry for Registry {
            async fn is_installed(&self, asset_id: &str) -> Result<bool, RegistryError>;
            async fn installed_version(&self, asset_id: &str) -> Result<Option<String>, RegistryError>;
            async fn open_installed_binary(&self, asset_id: &str) -> Result<InstalledBinary, RegistryError>;
        }
    }

    fn installed(version: &'static str) -> MockRegistry {
        let mut registry = MockRegistry::new();
        registry.expect_is_installed().returning(|_| Ok(true));
        registry
            .expect_installed_version()
            .returning(move |_| Ok(Some(version.to_string())));
        registry.expect_open_installed_binary().returning(|_| {
            Ok(InstalledBinary {
                stream: Box::new(&b"local"[..]),
                length: 5,
            })
        });
        registry
    }

    #[tokio::test]
    async fn mismatched_version_still_streams_installed_copy() {
        let strategy = LocalExtractionStrategy::new(Arc::new(installed("41")));

        let result = strategy
            .acquire(&AssetRequest::with_defaults("com.example.app", "42"))
            .await;

        match result {
            AcquisitionResult::LocalStream {
                length,
                installed_version,
                ..
            } => {
                assert_eq!(length, 5);
                assert_eq!(installed_version, "41");
            }
            other => panic!("expected local stream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn absent_package_is_not_installed() {
        let mut registry = MockRegistry::new();
        registry.expect_is_installed().returning(|_| Ok(false));
        registry.expect_open_installed_binary().never();

        let result = LocalExtractionStrategy::new(Arc::new(registry))
            .acquire(&AssetRequest::with_defaults("com.example.app", "42"))
            .await;

        assert!(matches!(
            result,
            AcquisitionResult::Unavailable(UnavailableReason::NotInstalled)
        ));
    }

    #[tokio::test]
    async fn unreadable_binary_is_io_unavailable() {
        let mut registry = MockRegistry::new();
        registry.expect_is_installed().returning(|_| Ok(true));
        registry
            .expect_installed_version()
            .returning(|_| Ok(Some("42".to_string())));
        registry
            .expect_open_installed_binary()
            .returning(|_| Err(RegistryError::Io("permission denied".to_string())));

        let result = LocalExtractionStrategy::new(Arc::new(registry))
            .acquire(&AssetRequest::with_defaults("com.example.app", "42"))
            .await;

        assert!(matches!(
            result,
            AcquisitionResult::Unavailable(UnavailableReason::Io { .. })
        ));
    }
}
