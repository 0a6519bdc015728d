//! Encoded stream URLs: codec, resolution and DRM activation

pub mod codec;
pub mod drm;
pub mod resolver;

pub use codec::{DecodedStream, MetadataCodec};
pub use drm::{base64url_to_hex, hex_to_base64url, ClearKeyEntry, ClearKeySet, DrmConfigBuilder};
pub use resolver::StreamDescriptorResolver;
