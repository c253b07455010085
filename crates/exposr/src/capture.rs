use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::CaptureError;

/// The photo handed from the camera screen to the result screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// Local reference used for display.
    pub uri: String,
    /// Base64 JPEG bytes used for transmission. May be empty if the device
    /// did not encode the frame.
    pub encoded_data: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl CapturedImage {
    pub fn has_encoded_data(&self) -> bool {
        !self.encoded_data.is_empty()
    }

    pub fn has_uri(&self) -> bool {
        !self.uri.is_empty()
    }

    pub fn data_uri(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.encoded_data)
    }
}

#[derive(Debug, Default)]
struct Slot {
    image: Option<CapturedImage>,
    generation: u64,
}

/// Single-slot holder for the most recent photo.
///
/// Every write (store or clear) bumps the generation. Analysis attempts
/// remember the generation they started from and drop their result if it has
/// moved on.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    slot: Mutex<Slot>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is buffered. Returns the new generation.
    pub fn store(&self, image: CapturedImage) -> u64 {
        let mut slot = self.slot.lock();
        slot.image = Some(image);
        slot.generation += 1;
        slot.generation
    }

    /// Discard the buffered photo. Returns the new generation.
    pub fn clear(&self) -> u64 {
        let mut slot = self.slot.lock();
        slot.image = None;
        slot.generation += 1;
        slot.generation
    }

    pub fn current(&self) -> Option<CapturedImage> {
        self.slot.lock().image.clone()
    }

    pub fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    /// Photo and generation read under one lock.
    pub fn snapshot(&self) -> (Option<CapturedImage>, u64) {
        let slot = self.slot.lock();
        (slot.image.clone(), slot.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StillOptions {
    pub encode_base64: bool,
}

/// What the device hands back for one still.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStill {
    pub uri: String,
    pub base64: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl From<RawStill> for CapturedImage {
    fn from(still: RawStill) -> Self {
        Self {
            uri: still.uri,
            encoded_data: still.base64.unwrap_or_default(),
            width: still.width,
            height: still.height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraFault {
    #[error("camera returned no frame")]
    NoFrame,
    #[error("{0}")]
    Device(String),
}

/// Camera collaborator. Only the [`CaptureController`] operates it.
#[async_trait]
pub trait Camera: Send + Sync {
    async fn request_permission(&self) -> Permission;
    fn current_permission(&self) -> Permission;
    async fn capture_still(&self, options: StillOptions) -> Result<RawStill, CameraFault>;
}

struct AttachedDevice {
    lease_id: u64,
    camera: Arc<dyn Camera>,
}

type DeviceSlot = Arc<Mutex<Option<AttachedDevice>>>;

/// Proof that a camera is attached to the controller. Dropping it releases
/// the device, so leaving the camera screen (or unwinding on error) always
/// detaches it.
#[must_use = "the camera is released as soon as the lease is dropped"]
pub struct CameraLease {
    lease_id: u64,
    slot: DeviceSlot,
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        // A newer lease may have replaced ours already.
        if slot.as_ref().is_some_and(|d| d.lease_id == self.lease_id) {
            *slot = None;
            debug!("Camera released (lease {})", self.lease_id);
        }
    }
}

/// Clears the in-flight flag on every exit path of `capture`.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Takes one still at a time and puts it in the [`CaptureBuffer`].
pub struct CaptureController {
    device: DeviceSlot,
    buffer: Arc<CaptureBuffer>,
    capturing: AtomicBool,
    next_lease: AtomicU64,
    options: StillOptions,
}

impl CaptureController {
    pub fn new(buffer: Arc<CaptureBuffer>, options: StillOptions) -> Self {
        Self {
            device: Arc::new(Mutex::new(None)),
            buffer,
            capturing: AtomicBool::new(false),
            next_lease: AtomicU64::new(1),
            options,
        }
    }

    /// Attach a camera for as long as the returned lease lives. Replaces any
    /// previously attached device.
    pub fn attach(&self, camera: Arc<dyn Camera>) -> CameraLease {
        let lease_id = self.next_lease.fetch_add(1, Ordering::Relaxed);
        *self.device.lock() = Some(AttachedDevice { lease_id, camera });
        debug!("Camera attached (lease {lease_id})");
        CameraLease {
            lease_id,
            slot: Arc::clone(&self.device),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.device.lock().is_some()
    }

    /// Presentation uses this to disable the shutter button.
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    fn camera(&self) -> Option<Arc<dyn Camera>> {
        self.device.lock().as_ref().map(|d| Arc::clone(&d.camera))
    }

    /// Ask for camera permission if the user has not decided yet.
    pub async fn ensure_permission(&self) -> Result<Permission, CaptureError> {
        let camera = self.camera().ok_or(CaptureError::CameraUnready)?;
        match camera.current_permission() {
            Permission::Undetermined => Ok(camera.request_permission().await),
            decided => Ok(decided),
        }
    }

    /// Take one still.
    ///
    /// Returns `Ok(None)` without touching the device when a capture is
    /// already in flight. On failure the buffer is left as it was.
    pub async fn capture(&self) -> Result<Option<CapturedImage>, CaptureError> {
        if self.capturing.swap(true, Ordering::AcqRel) {
            debug!("Capture ignored: already in flight");
            return Ok(None);
        }
        let _in_flight = InFlight(&self.capturing);

        let camera = self.camera().ok_or(CaptureError::CameraUnready)?;
        if camera.current_permission() != Permission::Granted {
            warn!("Capture refused: camera permission not granted");
            return Err(CaptureError::PermissionDenied);
        }

        let still = camera.capture_still(self.options).await.map_err(|e| {
            warn!("Capture failed: {e}");
            CaptureError::CaptureFailed(e.to_string())
        })?;

        let image = CapturedImage::from(still);
        let generation = self.buffer.store(image.clone());
        info!(
            "Captured photo {} ({}x{}, generation {generation})",
            image.uri,
            image.width.unwrap_or(0),
            image.height.unwrap_or(0),
        );
        Ok(Some(image))
    }
}

/// Camera backed by a JPEG on disk, for desktop hosts without a live feed.
///
/// Permission starts undetermined and is granted on request.
pub struct StillFileCamera {
    path: PathBuf,
    permission: Mutex<Permission>,
}

impl StillFileCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            permission: Mutex::new(Permission::Undetermined),
        }
    }
}

#[async_trait]
impl Camera for StillFileCamera {
    async fn request_permission(&self) -> Permission {
        let mut permission = self.permission.lock();
        *permission = Permission::Granted;
        *permission
    }

    fn current_permission(&self) -> Permission {
        *self.permission.lock()
    }

    async fn capture_still(&self, options: StillOptions) -> Result<RawStill, CameraFault> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CameraFault::Device(format!("{}: {e}", self.path.display())))?;
        if bytes.is_empty() {
            return Err(CameraFault::NoFrame);
        }

        // Dimensions are best-effort; the bytes are sent as they are.
        let dimensions = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());

        Ok(RawStill {
            uri: format!("file://{}", self.path.display()),
            base64: options.encode_base64.then(|| STANDARD.encode(&bytes)),
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
        })
    }
}
