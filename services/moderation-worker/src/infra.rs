use listing_moderation::moderation::repository::{
    ListingRejectedNotice, MediaStore, NotificationError, NotificationSink, StorageError,
};
use listing_moderation::moderation::SellerId;
use metrics_exporter_prometheus::PrometheusHandle;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Media store backed by a directory; asset references are paths relative to the root.
#[derive(Debug, Clone)]
pub(crate) struct FsMediaStore {
    root: PathBuf,
}

impl FsMediaStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `None` for references that would leave the media root.
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let relative = Path::new(reference);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if reference.trim().is_empty() || escapes {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl MediaStore for FsMediaStore {
    fn exists(&self, reference: &str) -> bool {
        self.resolve(reference).is_some_and(|path| path.is_file())
    }

    fn read_asset(&self, reference: &str) -> Result<image::RgbImage, StorageError> {
        let path = self
            .resolve(reference)
            .ok_or_else(|| StorageError::Missing(reference.to_string()))?;
        match image::open(&path) {
            Ok(decoded) => Ok(decoded.to_rgb8()),
            Err(image::ImageError::IoError(source)) if source.kind() == ErrorKind::NotFound => {
                Err(StorageError::Missing(reference.to_string()))
            }
            Err(image::ImageError::IoError(source)) => Err(StorageError::Io {
                reference: reference.to_string(),
                source,
            }),
            Err(other) => Err(StorageError::Decode {
                reference: reference.to_string(),
                detail: other.to_string(),
            }),
        }
    }

    fn delete_asset(&self, reference: &str) -> Result<bool, StorageError> {
        let Some(path) = self.resolve(reference) else {
            warn!(reference, "refusing to delete a reference outside the media root");
            return Ok(false);
        };
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Io {
                reference: reference.to_string(),
                source,
            }),
        }
    }
}

/// Emits rejection notices into the structured log stream.
#[derive(Debug, Default, Clone)]
pub(crate) struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn emit(
        &self,
        recipient: &SellerId,
        notice: ListingRejectedNotice,
    ) -> Result<(), NotificationError> {
        info!(
            recipient = %recipient,
            listing_title = %notice.listing_title,
            category = %notice.category,
            reason = %notice.reason,
            "listing rejection notice"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "moderation-worker-{name}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(dir.join("uploads")).expect("scratch dir");
        dir
    }

    #[test]
    fn fs_store_reads_and_deletes_images() {
        let root = scratch_dir("roundtrip");
        RgbImage::from_pixel(8, 8, Rgb([10, 200, 30]))
            .save(root.join("uploads/front.png"))
            .expect("write png");
        let store = FsMediaStore::new(&root);

        assert!(store.exists("uploads/front.png"));
        let image = store.read_asset("uploads/front.png").expect("decodes");
        assert_eq!(image.dimensions(), (8, 8));
        assert_eq!(image.get_pixel(0, 0), &Rgb([10, 200, 30]));

        assert!(store.delete_asset("uploads/front.png").expect("deletes"));
        assert!(!store.exists("uploads/front.png"));
        assert!(!store.delete_asset("uploads/front.png").expect("already gone"));

        std::fs::remove_dir_all(root).expect("cleanup");
    }

    #[test]
    fn fs_store_reports_undecodable_content() {
        let root = scratch_dir("corrupt");
        std::fs::write(root.join("uploads/broken.jpg"), b"not an image").expect("write file");
        let store = FsMediaStore::new(&root);

        assert!(store.exists("uploads/broken.jpg"));
        assert!(matches!(
            store.read_asset("uploads/broken.jpg"),
            Err(StorageError::Decode { .. })
        ));
        assert!(matches!(
            store.read_asset("uploads/missing.jpg"),
            Err(StorageError::Missing(_))
        ));

        std::fs::remove_dir_all(root).expect("cleanup");
    }

    #[test]
    fn fs_store_refuses_references_outside_the_root() {
        let store = FsMediaStore::new(std::env::temp_dir());
        assert!(!store.exists("../etc/passwd"));
        assert!(!store.exists("/etc/passwd"));
        assert!(matches!(
            store.read_asset("../secret.png"),
            Err(StorageError::Missing(_))
        ));
        assert!(!store.delete_asset("/etc/passwd").expect("refused"));
    }
}
