//! pointcloud_stream - Out-of-core point cloud octrees with budgeted streaming
//!
//! Point clouds far larger than memory are split once into an on-disk octree
//! of level-of-detail nodes, then streamed back into a renderer under a hard
//! limit on simultaneously shown nodes.
//!
//! # Features
//!
//! - **Octree construction**: two passes over a flat ASCII file, sampled
//!   root retention, parallel subtree writes with rayon
//! - **Node store**: one binary file per node, addressed by octant path
//! - **Frustum culling**: Gribb–Hartmann planes, 9-sample box classification
//! - **Budgeted scheduling**: priority by screen presence, cancellation of
//!   stale loads, collapse of fully visible branches
//! - **Recency cache**: evicted payloads are kept warm in the loader
//!
//! # Example
//!
//! ```ignore
//! use pointcloud_stream::{OctreeBuilder, StreamingConfig, StreamingSession};
//!
//! let report = OctreeBuilder::default().build(input, "xyzrgb", output)?;
//! let (session, mut endpoint) = StreamingSession::open(&report.output_dir, StreamingConfig::default())?;
//!
//! loop {
//!     // draw...
//!     endpoint.end_frame(camera_matrix, user_is_dragging, &mut my_renderer);
//! }
//! ```

pub mod error;
pub mod point;
pub use error::{BuildError, StoreError, StreamError};
pub use point::{InputLayout, NodePoints, PointRecord, PointStructure};

// Octree addressing and geometry
pub mod octree;
pub use octree::{BoundingBox, ExistenceMask, Octant, OctreeBounds, SpatialAddress};

// On-disk node store
pub mod store;
pub use store::{ClassLabels, CloudMetadata, NodeStore, StoredNode};

// Octree construction
pub mod build;
pub use build::{BuildConfig, BuildReport, OctreeBuilder};

// Streaming runtime
pub mod cache;
pub mod config;
pub mod frustum;
pub mod hierarchy;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub use cache::{RecencyCache, RecencyCacheEntry};
pub use config::StreamingConfig;
pub use frustum::{FrustumCuller, Visibility};
pub use hierarchy::{HierarchyMirror, VisNode};
pub use metrics::StreamingMetrics;
pub use pipeline::{CameraSlot, PointRenderer, RendererEndpoint, StreamingSession};
pub use scheduler::{Scheduler, TickReport};

#[cfg(test)]
pub(crate) mod test_utils;
