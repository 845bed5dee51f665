//! Drives adaptive images against the shared cache and visibility source.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::domain::entities::{ElementId, LoadState, LoadedImage, Rect, Viewport};
use crate::domain::errors::LoadResult;
use crate::domain::ports::{ImageCachePort, VisibilityPort};
use crate::infrastructure::config::LoadingConfig;
use crate::infrastructure::image::{ResolvedImage, StorageBackend};
use crate::presentation::widgets::{
    AdaptiveImage, ImageProps, ImageView, LoadCallbacks, LoadRequest,
};

/// Completed load for one mounted image.
#[derive(Debug, Clone)]
pub struct ImageLoadedEvent {
    /// Image the load was started for.
    pub element: ElementId,
    /// Requested URL.
    pub url: String,
    /// Load outcome.
    pub result: LoadResult<LoadedImage>,
}

/// Owns every mounted [`AdaptiveImage`] and runs their loads.
///
/// Loads run as background tasks through the cache; their results come back
/// over a channel and are applied on the owner's side by
/// [`ImageDeliveryService::next_event`] or
/// [`ImageDeliveryService::drain_events`].
pub struct ImageDeliveryService {
    cache: Arc<dyn ImageCachePort>,
    visibility: Arc<dyn VisibilityPort>,
    backend: StorageBackend,
    loading: LoadingConfig,
    viewport: Viewport,
    images: HashMap<ElementId, AdaptiveImage>,
    event_tx: mpsc::UnboundedSender<ImageLoadedEvent>,
    event_rx: mpsc::UnboundedReceiver<ImageLoadedEvent>,
}

impl ImageDeliveryService {
    /// Creates a service with no mounted images.
    #[must_use]
    pub fn new(
        cache: Arc<dyn ImageCachePort>,
        visibility: Arc<dyn VisibilityPort>,
        backend: StorageBackend,
        loading: LoadingConfig,
        viewport: Viewport,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            cache,
            visibility,
            backend,
            loading,
            viewport,
            images: HashMap::new(),
            event_tx,
            event_rx,
        }
    }

    /// The shared cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn ImageCachePort> {
        &self.cache
    }

    /// Viewport used for mount-time proximity checks.
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Updates the viewport used for later mounts.
    ///
    /// Only mount-time proximity checks read this value. Images already
    /// waiting for visibility are tracked by the visibility source, so
    /// callers must resize that source as well (for example with
    /// `ViewportObserver::set_viewport`).
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Number of mounted images.
    #[must_use]
    pub fn mounted(&self) -> usize {
        self.images.len()
    }

    /// Mounts a new image at `bounds` and starts its load if it is due.
    ///
    /// A missing root margin is filled from the loading configuration.
    pub fn mount(&mut self, mut props: ImageProps, bounds: Rect, callbacks: LoadCallbacks) -> ElementId {
        if props.root_margin.is_none() {
            props.root_margin = Some(self.loading.margin_for(props.context));
        }
        let resolved = ResolvedImage::resolve_with(&self.backend, &props.src, props.context);
        let mut image = AdaptiveImage::new(props, resolved, callbacks);
        let id = image.id();

        let request = image.mount(bounds, self.viewport, self.visibility.as_ref());
        self.images.insert(id, image);
        if let Some(request) = request {
            self.start(request);
        }
        id
    }

    /// Starts loads for every image that became visible since the last poll.
    /// Returns how many started.
    pub fn poll_visibility(&mut self) -> usize {
        let requests: Vec<LoadRequest> = self
            .images
            .values_mut()
            .filter_map(AdaptiveImage::poll_visibility)
            .collect();
        let started = requests.len();
        for request in requests {
            self.start(request);
        }
        started
    }

    /// Waits for the next completed load and applies it.
    ///
    /// Results for images that were unmounted in the meantime are consumed
    /// and dropped.
    pub async fn next_event(&mut self) -> Option<ImageLoadedEvent> {
        let event = self.event_rx.recv().await?;
        self.dispatch(&event);
        Some(event)
    }

    /// Applies every completed load that is already queued.
    /// Returns how many were applied.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            if self.dispatch(&event) {
                applied += 1;
            }
        }
        applied
    }

    /// Unmounts an image. Its pending observation is released and any load
    /// still running for it is ignored when it completes.
    pub fn unmount(&mut self, element: ElementId) -> bool {
        match self.images.remove(&element) {
            Some(mut image) => {
                image.unmount(self.visibility.as_ref());
                true
            }
            None => false,
        }
    }

    /// Load state of a mounted image.
    #[must_use]
    pub fn state(&self, element: ElementId) -> Option<LoadState> {
        self.images.get(&element).map(AdaptiveImage::state)
    }

    /// What to draw for a mounted image.
    #[must_use]
    pub fn view(&self, element: ElementId) -> Option<ImageView> {
        self.images.get(&element).map(AdaptiveImage::view)
    }

    /// A mounted image.
    #[must_use]
    pub fn image(&self, element: ElementId) -> Option<&AdaptiveImage> {
        self.images.get(&element)
    }

    fn start(&self, request: LoadRequest) {
        if let Some(warmup) = request.warmup.filter(|w| *w != request.url) {
            let cache = self.cache.clone();
            tokio::spawn(async move {
                if let Err(e) = cache.preload(&warmup).await {
                    trace!(url = %warmup, error = %e, "Warmup preload failed");
                }
            });
        }

        let cache = self.cache.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = cache.preload(&request.url).await;
            let _ = event_tx.send(ImageLoadedEvent {
                element: request.element,
                url: request.url,
                result,
            });
        });
    }

    fn dispatch(&mut self, event: &ImageLoadedEvent) -> bool {
        let Some(image) = self.images.get_mut(&event.element) else {
            debug!(element = %event.element, "Dropping result for unmounted image");
            return false;
        };
        if let Err(e) = &event.result {
            debug!(element = %event.element, error = %e, "Image load failed");
        }
        image.handle_result(&event.result)
    }
}

impl std::fmt::Debug for ImageDeliveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDeliveryService")
            .field("viewport", &self.viewport)
            .field("mounted", &self.images.len())
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::domain::entities::ImageContext;
    use crate::domain::ports::mocks::MockImageFetcher;
    use crate::infrastructure::image::MemoryImageCache;
    use crate::infrastructure::visibility::ViewportObserver;

    const SRC: &str = "https://shop.supabase.co/storage/v1/object/public/p/coat.jpg";

    struct Harness {
        fetcher: Arc<MockImageFetcher>,
        observer: Arc<ViewportObserver>,
        service: ImageDeliveryService,
    }

    fn harness_with(fetcher: MockImageFetcher) -> Harness {
        let fetcher = Arc::new(fetcher);
        let viewport = Viewport::new(1000.0, 800.0);
        let observer = Arc::new(ViewportObserver::new(viewport));
        let cache = Arc::new(MemoryImageCache::new(fetcher.clone(), 10));
        let service = ImageDeliveryService::new(
            cache,
            observer.clone(),
            StorageBackend::default(),
            LoadingConfig::default(),
            viewport,
        );
        Harness {
            fetcher,
            observer,
            service,
        }
    }

    fn harness() -> Harness {
        harness_with(MockImageFetcher::new())
    }

    fn off_screen() -> Rect {
        Rect::new(0.0, 3000.0, 300.0, 400.0)
    }

    fn counter() -> (LoadCallbacks, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let callbacks = {
            let loads = loads.clone();
            let errors = errors.clone();
            LoadCallbacks::new()
                .on_load(move |_| {
                    loads.fetch_add(1, Ordering::SeqCst);
                })
                .on_error(move |_| {
                    errors.fetch_add(1, Ordering::SeqCst);
                })
        };
        (callbacks, loads, errors)
    }

    /// Lets background loads run until `url` was fetched or the runtime
    /// has had ample chances to start it.
    async fn settle(fetcher: &MockImageFetcher, url: &str) {
        for _ in 0..32 {
            if fetcher.calls(url) > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_priority_image_loads_and_warms_largest() {
        let mut h = harness();
        let (callbacks, loads, _) = counter();
        let props = ImageProps::new(SRC, ImageContext::Card).with_priority(true);

        let id = h.service.mount(props, off_screen(), callbacks);
        assert_eq!(h.service.state(id), Some(LoadState::Loading));

        let event = h.service.next_event().await.unwrap();
        assert_eq!(event.element, id);
        assert!(event.result.is_ok());
        assert_eq!(h.service.state(id), Some(LoadState::Loaded));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let largest = h.service.image(id).unwrap().zoom_url().to_string();
        settle(&h.fetcher, &largest).await;
        assert_eq!(h.fetcher.calls(&largest), 1);
        assert_eq!(h.observer.pending(), 0);

        let cached = h.service.cache().preload(&largest).await;
        assert!(cached.is_ok());
        assert_eq!(h.fetcher.calls(&largest), 1);
    }

    #[tokio::test]
    async fn test_lazy_image_skips_warmup() {
        let mut h = harness();
        let on_screen = Rect::new(0.0, 0.0, 300.0, 400.0);

        let id = h.service.mount(ImageProps::new(SRC, ImageContext::Card), on_screen, LoadCallbacks::new());
        h.service.next_event().await.unwrap();

        let image = h.service.image(id).unwrap();
        let src = image.resolved().src.clone();
        let largest = image.zoom_url().to_string();
        assert_ne!(src, largest);

        settle(&h.fetcher, &largest).await;
        assert_eq!(h.fetcher.calls(&src), 1);
        assert_eq!(h.fetcher.calls(&largest), 0);
        assert!(!h.service.cache().has(&largest));
    }

    #[tokio::test]
    async fn test_scroll_starts_deferred_load() {
        let mut h = harness();
        let id = h.service.mount(ImageProps::new(SRC, ImageContext::Card), off_screen(), LoadCallbacks::new());

        assert_eq!(h.service.state(id), Some(LoadState::NotRequested));
        assert_eq!(h.service.poll_visibility(), 0);
        assert_eq!(h.fetcher.total_calls(), 0);

        assert_eq!(h.observer.scroll_by(2000.0), 1);
        assert_eq!(h.service.poll_visibility(), 1);
        assert_eq!(h.service.state(id), Some(LoadState::Loading));

        h.service.next_event().await.unwrap();
        assert_eq!(h.service.state(id), Some(LoadState::Loaded));
        assert!(matches!(h.service.view(id), Some(ImageView::Loaded(_))));
    }

    #[tokio::test]
    async fn test_unmount_before_result_suppresses_callbacks() {
        let (fetcher, gate) = MockImageFetcher::new().gated();
        let mut h = harness_with(fetcher);
        let (callbacks, loads, errors) = counter();

        let id = h.service.mount(
            ImageProps::new(SRC, ImageContext::Detail).with_priority(true),
            off_screen(),
            callbacks,
        );
        assert!(h.service.unmount(id));
        gate.add_permits(2);

        let event = h.service.next_event().await.unwrap();
        assert_eq!(event.element, id);
        assert_eq!(h.service.state(id), None);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_load_reports_error() {
        let url = crate::infrastructure::image::image_preset(ImageContext::Thumbnail, SRC);
        let mut h = harness_with(MockImageFetcher::new().failing(url));
        let (callbacks, loads, errors) = counter();

        let id = h.service.mount(
            ImageProps::new(SRC, ImageContext::Thumbnail),
            Rect::new(0.0, 0.0, 100.0, 133.0),
            callbacks,
        );
        let event = h.service.next_event().await.unwrap();

        assert!(event.result.is_err());
        assert_eq!(h.service.state(id), Some(LoadState::Errored));
        assert!(matches!(h.service.view(id), Some(ImageView::Unavailable { .. })));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_same_source_shares_one_fetch() {
        let (fetcher, gate) = MockImageFetcher::new().gated();
        let mut h = harness_with(fetcher);
        let on_screen = Rect::new(0.0, 0.0, 300.0, 400.0);

        let a = h.service.mount(ImageProps::new(SRC, ImageContext::Card), on_screen, LoadCallbacks::new());
        let b = h.service.mount(ImageProps::new(SRC, ImageContext::Card), on_screen, LoadCallbacks::new());
        gate.add_permits(1);

        h.service.next_event().await.unwrap();
        h.service.next_event().await.unwrap();

        let url = crate::infrastructure::image::image_preset(ImageContext::Card, SRC);
        assert_eq!(h.fetcher.calls(&url), 1);
        assert_eq!(h.service.state(a), Some(LoadState::Loaded));
        assert_eq!(h.service.state(b), Some(LoadState::Loaded));
    }

    #[tokio::test]
    async fn test_set_viewport_affects_later_mounts_only() {
        let mut h = harness();
        let bounds = Rect::new(0.0, 1500.0, 300.0, 400.0);

        let before = h.service.mount(ImageProps::new(SRC, ImageContext::Card), bounds, LoadCallbacks::new());
        h.service.set_viewport(Viewport::new(1000.0, 1400.0));
        let after = h.service.mount(ImageProps::new(SRC, ImageContext::Card), bounds, LoadCallbacks::new());

        assert_eq!(h.service.viewport(), Viewport::new(1000.0, 1400.0));
        assert_eq!(h.service.state(before), Some(LoadState::NotRequested));
        assert_eq!(h.service.state(after), Some(LoadState::Loading));

        assert_eq!(h.observer.set_viewport(Viewport::new(1000.0, 1400.0)), 1);
        assert_eq!(h.service.poll_visibility(), 1);
        assert_eq!(h.service.state(before), Some(LoadState::Loading));
    }

    #[tokio::test]
    async fn test_unmount_releases_observation() {
        let mut h = harness();
        let id = h.service.mount(ImageProps::new(SRC, ImageContext::GalleryThumb), off_screen(), LoadCallbacks::new());
        assert_eq!(h.observer.pending(), 1);

        assert!(h.service.unmount(id));
        assert!(!h.service.unmount(id));
        assert_eq!(h.observer.pending(), 0);
        assert_eq!(h.observer.scroll_by(3000.0), 0);
        assert_eq!(h.service.mounted(), 0);
    }

    #[tokio::test]
    async fn test_configured_margin_applies() {
        let fetcher = Arc::new(MockImageFetcher::new());
        let viewport = Viewport::new(1000.0, 800.0);
        let observer = Arc::new(ViewportObserver::new(viewport));
        let mut service = ImageDeliveryService::new(
            Arc::new(MemoryImageCache::new(fetcher, 10)),
            observer.clone(),
            StorageBackend::default(),
            LoadingConfig {
                primary_margin: Some(1000),
                secondary_margin: None,
            },
            viewport,
        );

        let bounds = Rect::new(0.0, 1500.0, 300.0, 400.0);
        let card = service.mount(ImageProps::new(SRC, ImageContext::Card), bounds, LoadCallbacks::new());
        let thumb = service.mount(ImageProps::new(SRC, ImageContext::Thumbnail), bounds, LoadCallbacks::new());

        assert_eq!(service.state(card), Some(LoadState::Loading));
        assert_eq!(service.state(thumb), Some(LoadState::NotRequested));
        assert_eq!(observer.pending(), 1);
    }
}
