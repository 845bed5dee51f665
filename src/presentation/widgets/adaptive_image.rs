//! Adaptive image loading for one rendered image.
//!
//! An [`AdaptiveImage`] decides when its image starts loading: immediately for
//! priority images, otherwise once the element comes within its root margin of
//! the viewport. It never fetches by itself; it hands out a [`LoadRequest`]
//! and is told the outcome through [`AdaptiveImage::handle_result`].

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, trace};

use crate::domain::entities::{
    AspectRatio, ElementId, ImageContext, LoadState, LoadedImage, Rect, Viewport,
};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::VisibilityPort;
use crate::infrastructure::image::ResolvedImage;

/// Fetch priority hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPriority {
    /// Above the fold.
    High,
    /// Let the fetcher decide.
    #[default]
    Auto,
}

/// Loading mode hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingMode {
    /// Load right away.
    Eager,
    /// Load when near the viewport.
    #[default]
    Lazy,
}

/// What the consumer passes in to render one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageProps {
    /// Source URL from the data layer; may be empty.
    pub src: String,
    /// Usage context.
    pub context: ImageContext,
    /// Load immediately at high priority.
    pub priority: bool,
    /// Box ratio used for placeholders.
    pub aspect_ratio: AspectRatio,
    /// Overrides the context's proximity margin.
    pub root_margin: Option<u32>,
    /// Alternative text.
    pub alt: String,
}

impl ImageProps {
    /// Creates props for a lazily loaded portrait image.
    #[must_use]
    pub fn new(src: impl Into<String>, context: ImageContext) -> Self {
        Self {
            src: src.into(),
            context,
            priority: false,
            aspect_ratio: AspectRatio::PORTRAIT,
            root_margin: None,
            alt: String::new(),
        }
    }

    /// Sets the priority flag.
    #[must_use]
    pub const fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the aspect ratio.
    #[must_use]
    pub const fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Sets the proximity margin.
    #[must_use]
    pub const fn with_root_margin(mut self, margin: u32) -> Self {
        self.root_margin = Some(margin);
        self
    }

    /// Sets the alternative text.
    #[must_use]
    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = alt.into();
        self
    }

    /// Margin in effect: the override, else the context default.
    #[must_use]
    pub fn effective_margin(&self) -> u32 {
        self.root_margin
            .unwrap_or(self.context.profile().root_margin)
    }
}

/// A load the owner must start on behalf of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// The requesting instance.
    pub element: ElementId,
    /// URL to load.
    pub url: String,
    /// Priority hint.
    pub fetch_priority: FetchPriority,
    /// Loading mode hint.
    pub loading: LoadingMode,
    /// Extra URL to warm the cache with, for priority images.
    pub warmup: Option<String>,
}

type LoadCallback = Box<dyn FnMut(&LoadedImage) + Send>;
type ErrorCallback = Box<dyn FnMut(&LoadError) + Send>;

/// Consumer notifications. Never invoked after unmount.
#[derive(Default)]
pub struct LoadCallbacks {
    on_load: Option<LoadCallback>,
    on_error: Option<ErrorCallback>,
}

impl LoadCallbacks {
    /// No callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once when the image loads.
    #[must_use]
    pub fn on_load(mut self, f: impl FnMut(&LoadedImage) + Send + 'static) -> Self {
        self.on_load = Some(Box::new(f));
        self
    }

    /// Called once when the image fails.
    #[must_use]
    pub fn on_error(mut self, f: impl FnMut(&LoadError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for LoadCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadCallbacks")
            .field("on_load", &self.on_load.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Attributes for the rendered image element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageAttributes {
    /// Preset URL.
    pub src: String,
    /// Responsive candidates.
    pub srcset: String,
    /// Sizes hint.
    pub sizes: &'static str,
    /// Loading mode.
    pub loading: LoadingMode,
    /// Fetch priority.
    #[serde(rename = "fetchpriority")]
    pub fetch_priority: FetchPriority,
    /// Always `async`.
    pub decoding: &'static str,
    /// Alternative text.
    pub alt: String,
    /// Box ratio.
    #[serde(rename = "aspect-ratio", serialize_with = "serialize_ratio")]
    pub aspect_ratio: AspectRatio,
}

fn serialize_ratio<S: serde::Serializer>(ratio: &AspectRatio, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(ratio)
}

/// What the consumer should draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ImageView {
    /// Skeleton box; nothing requested yet.
    Placeholder {
        /// Box ratio.
        aspect_ratio: AspectRatio,
    },
    /// Image element present, still loading.
    Loading(ImageAttributes),
    /// Image element ready.
    Loaded(ImageAttributes),
    /// Broken-image affordance.
    Unavailable {
        /// Box ratio.
        aspect_ratio: AspectRatio,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Mounted,
    Unmounted,
}

/// Loading controller for one image instance.
pub struct AdaptiveImage {
    id: ElementId,
    props: ImageProps,
    resolved: ResolvedImage,
    state: LoadState,
    lifecycle: Lifecycle,
    fetch_priority: FetchPriority,
    loading: LoadingMode,
    observation: Option<oneshot::Receiver<()>>,
    callbacks: LoadCallbacks,
}

impl AdaptiveImage {
    /// Creates an unmounted instance.
    #[must_use]
    pub fn new(props: ImageProps, resolved: ResolvedImage, callbacks: LoadCallbacks) -> Self {
        Self {
            id: ElementId::new(),
            props,
            resolved,
            state: LoadState::NotRequested,
            lifecycle: Lifecycle::Created,
            fetch_priority: FetchPriority::Auto,
            loading: LoadingMode::Lazy,
            observation: None,
            callbacks,
        }
    }

    /// Creates an instance resolved against the default storage backend.
    #[must_use]
    pub fn from_props(props: ImageProps, callbacks: LoadCallbacks) -> Self {
        let resolved = ResolvedImage::resolve(&props.src, props.context);
        Self::new(props, resolved, callbacks)
    }

    /// Instance identifier.
    #[must_use]
    pub const fn id(&self) -> ElementId {
        self.id
    }

    /// Current load state.
    #[must_use]
    pub const fn state(&self) -> LoadState {
        self.state
    }

    /// The props this instance was created with.
    #[must_use]
    pub const fn props(&self) -> &ImageProps {
        &self.props
    }

    /// Resolved URLs.
    #[must_use]
    pub const fn resolved(&self) -> &ResolvedImage {
        &self.resolved
    }

    /// Highest-detail URL, e.g. for a zoom lens.
    #[must_use]
    pub fn zoom_url(&self) -> &str {
        self.resolved.largest_url()
    }

    /// Returns true while a visibility registration is pending.
    #[must_use]
    pub const fn is_observing(&self) -> bool {
        self.observation.is_some()
    }

    /// Mounts the instance at `bounds`.
    ///
    /// Priority images start loading right away. Others start if already
    /// near the viewport, and otherwise register with `visibility`.
    /// Mounting twice is a no-op.
    pub fn mount(
        &mut self,
        bounds: Rect,
        viewport: Viewport,
        visibility: &dyn VisibilityPort,
    ) -> Option<LoadRequest> {
        if self.lifecycle != Lifecycle::Created {
            return None;
        }
        self.lifecycle = Lifecycle::Mounted;

        if self.props.src.trim().is_empty() {
            debug!(element = %self.id, "Image has no source");
            self.finish(&Err(LoadError::EmptySource));
            return None;
        }

        if self.props.priority {
            return Some(self.begin(FetchPriority::High, LoadingMode::Eager));
        }

        let margin = self.props.effective_margin();
        if viewport.is_near(&bounds, margin) {
            return Some(self.begin(FetchPriority::Auto, LoadingMode::Lazy));
        }

        trace!(element = %self.id, margin, "Deferring image until visible");
        self.observation = Some(visibility.observe(self.id, bounds, margin));
        None
    }

    /// Checks the visibility registration without waiting.
    ///
    /// Returns the load request the first time the element is reported
    /// visible; the registration is dropped at that point.
    pub fn poll_visibility(&mut self) -> Option<LoadRequest> {
        let observation = self.observation.as_mut()?;
        match observation.try_recv() {
            Ok(()) => {
                self.observation = None;
                self.on_visible()
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                debug!(element = %self.id, "Visibility registration dropped by source");
                self.observation = None;
                None
            }
        }
    }

    /// Waits until the element is reported visible.
    ///
    /// Resolves to `None` when there is nothing to wait for or the source
    /// dropped the registration.
    pub async fn visible(&mut self) -> Option<LoadRequest> {
        let observation = self.observation.as_mut()?;
        let fired = observation.await.is_ok();
        self.observation = None;
        if fired { self.on_visible() } else { None }
    }

    /// Applies the outcome of this instance's load.
    ///
    /// Returns false, without calling back, if the instance is unmounted or
    /// not loading.
    pub fn handle_result(&mut self, result: &LoadResult<LoadedImage>) -> bool {
        if self.lifecycle != Lifecycle::Mounted || !self.state.is_loading() {
            trace!(element = %self.id, state = %self.state, "Ignoring load result");
            return false;
        }
        self.finish(result);
        true
    }

    /// Tears the instance down, releasing any pending registration.
    /// Later results are ignored and callbacks are dropped.
    pub fn unmount(&mut self, visibility: &dyn VisibilityPort) {
        if self.observation.take().is_some() {
            visibility.unobserve(self.id);
        }
        self.lifecycle = Lifecycle::Unmounted;
        self.callbacks = LoadCallbacks::default();
        trace!(element = %self.id, state = %self.state, "Unmounted image");
    }

    /// Element attributes in the current state.
    #[must_use]
    pub fn attributes(&self) -> ImageAttributes {
        ImageAttributes {
            src: self.resolved.src.clone(),
            srcset: self.resolved.srcset.clone(),
            sizes: self.resolved.sizes,
            loading: self.loading,
            fetch_priority: self.fetch_priority,
            decoding: "async",
            alt: self.props.alt.clone(),
            aspect_ratio: self.props.aspect_ratio,
        }
    }

    /// What to draw.
    #[must_use]
    pub fn view(&self) -> ImageView {
        let aspect_ratio = self.props.aspect_ratio;
        match self.state {
            LoadState::NotRequested => ImageView::Placeholder { aspect_ratio },
            LoadState::Loading => ImageView::Loading(self.attributes()),
            LoadState::Loaded => ImageView::Loaded(self.attributes()),
            LoadState::Errored => ImageView::Unavailable { aspect_ratio },
        }
    }

    fn on_visible(&mut self) -> Option<LoadRequest> {
        if self.lifecycle != Lifecycle::Mounted || !self.state.is_not_requested() {
            return None;
        }
        Some(self.begin(FetchPriority::Auto, LoadingMode::Lazy))
    }

    fn begin(&mut self, fetch_priority: FetchPriority, loading: LoadingMode) -> LoadRequest {
        self.state = LoadState::Loading;
        self.fetch_priority = fetch_priority;
        self.loading = loading;

        let warmup = (fetch_priority == FetchPriority::High)
            .then(|| self.resolved.largest_url().to_string());
        debug!(element = %self.id, url = %self.resolved.src, ?fetch_priority, "Image loading");

        LoadRequest {
            element: self.id,
            url: self.resolved.src.clone(),
            fetch_priority,
            loading,
            warmup,
        }
    }

    fn finish(&mut self, result: &LoadResult<LoadedImage>) {
        match result {
            Ok(image) => {
                self.state = LoadState::Loaded;
                if let Some(on_load) = self.callbacks.on_load.as_mut() {
                    on_load(image);
                }
            }
            Err(e) => {
                self.state = LoadState::Errored;
                debug!(element = %self.id, error = %e, "Image unavailable");
                if let Some(on_error) = self.callbacks.on_error.as_mut() {
                    on_error(e);
                }
            }
        }
    }
}

impl std::fmt::Debug for AdaptiveImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveImage")
            .field("id", &self.id)
            .field("src", &self.props.src)
            .field("context", &self.props.context)
            .field("state", &self.state)
            .field("observing", &self.observation.is_some())
            .finish_non_exhaustive()
    }
}
