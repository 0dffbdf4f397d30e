//! Engine data structures.
//!
//! - `vertex` holds the vertex formats and the stream layouts they bind with
//! - `transform` is the flat per-object placement (position + three axis rotations)
//! - `texture` wraps device textures and the depth buffer

pub mod texture;
pub mod transform;
pub mod vertex;
