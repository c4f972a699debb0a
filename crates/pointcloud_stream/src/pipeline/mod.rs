//! Streaming Pipeline
//!
//! Three actors exchange work over unbounded FIFO queues; the camera matrix
//! is the only shared state.
//!
//! ```text
//! ┌───────────┐  LoadRequest   ┌────────┐
//! │ Scheduler ├───────────────►│ Loader │◄──── store (node files)
//! │  (thread) │◄───────────────┤(thread)│
//! └─┬───────▲─┘   LoadResult   └───▲────┘
//!   │       │                      │ CacheReturn
//!   │       │ PickResult           │
//!   │ RenderAdd / RenderRemove ┌───┴──────────────┐
//!   └─────────────────────────►│ RendererEndpoint │ (host frame loop)
//!           ▲                  └───┬──────────────┘
//!           └──── CameraSlot ◄─────┘
//! ```
//!
//! # Ordering
//!
//! Render commands carry a sequence number shared by the add and remove
//! queues; the endpoint merges them back into issue order.
//!
//! # Modules
//!
//! - [`types`]: queue messages and the per-actor port bundles
//! - [`camera`]: the shared camera slot
//! - [`loader`]: reads payloads through the recency cache
//! - [`renderer`]: frame-driven endpoint and the [`PointRenderer`] seam
//! - [`session`]: thread lifecycle

pub mod camera;
pub mod loader;
pub mod renderer;
pub mod session;
pub mod types;

// Re-exports
pub use camera::CameraSlot;
pub use loader::Loader;
pub use renderer::{PointRenderer, RenderCommand, RendererEndpoint};
pub use session::StreamingSession;
pub use types::{
  CacheReturn, LoadOutcome, LoadRequest, LoadResult, LoaderPorts, PickResult, PipelineContext,
  RenderAdd, RenderRemove, RendererPorts, SchedulerPorts,
};
