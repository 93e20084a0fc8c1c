//! Device position sources.
//!
//! A position is acquired once per request; there is no watch mode and an
//! in-flight acquisition cannot be aborted.

use crate::types::{Coordinates, GeolocationError};
use async_trait::async_trait;

#[async_trait]
pub trait PositionSource: Send + Sync {
    /// One-shot acquisition of the current device position.
    async fn current_position(&self) -> Result<Coordinates, GeolocationError>;
}

/// A position fixed by configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinates);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Ok(self.0)
    }
}

/// Used on platforms without a location service.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedPosition;

#[async_trait]
impl PositionSource for UnsupportedPosition {
    async fn current_position(&self) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_position() {
        let source = FixedPosition(Coordinates::new(47.6062, -122.3321));
        assert_eq!(
            source.current_position().await,
            Ok(Coordinates::new(47.6062, -122.3321))
        );
    }

    #[tokio::test]
    async fn test_unsupported_position() {
        let source: Box<dyn PositionSource> = Box::new(UnsupportedPosition);
        assert_eq!(
            source.current_position().await,
            Err(GeolocationError::Unsupported)
        );
    }
}
