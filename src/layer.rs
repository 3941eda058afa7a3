use crate::{Turnstile, TurnstileConfig, TurnstileMiddleware, TransportError};
use tower_layer::Layer;

/// Layer that applies Turnstile verification middleware
#[derive(Clone, Debug)]
pub struct TurnstileLayer {
    turnstile: Turnstile,
}

impl TurnstileLayer {
    /// Create a new Turnstile layer around an existing verifier
    pub fn new(turnstile: Turnstile) -> Self {
        Self { turnstile }
    }

    /// Create a new Turnstile layer from a config
    pub fn from_config(config: TurnstileConfig) -> Result<Self, TransportError> {
        Turnstile::new(config).map(Self::new)
    }

    /// Create a new Turnstile layer with just a secret key
    pub fn from_secret(secret: impl Into<String>) -> Result<Self, TransportError> {
        Self::from_config(TurnstileConfig::new(secret))
    }
}

impl<S> Layer<S> for TurnstileLayer {
    type Service = TurnstileMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TurnstileMiddleware::new(inner, self.turnstile.clone())
    }
}
