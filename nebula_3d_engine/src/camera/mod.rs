//! Camera module: cameras, frustums and bounding volumes.
//!
//! Provides the visibility primitives of the frame pipeline.
//! The engine does NOT store or manage cameras; they are tools
//! provided by the engine, owned and driven by the caller.

mod bounds;
mod camera;
mod frustum;
mod plane;

pub use bounds::{AABB, BoundingSphere, ScreenRect};
pub use camera::Camera;
pub use frustum::{
    Frustum, Intersection,
    PLANE_NEAR, PLANE_LEFT, PLANE_RIGHT, PLANE_UP, PLANE_DOWN, PLANE_FAR,
    NUM_FRUSTUM_PLANES, NUM_FRUSTUM_VERTICES,
};
pub use plane::Plane;
