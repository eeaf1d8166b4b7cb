use std::sync::Arc;

use tokio::time::timeout;
use tracing::{info, warn};

use groundrag_core::error::Error;
use groundrag_core::traits::{GenerationRequest, Generator};

/// Primary generation target plus an optional faster fallback.
#[derive(Clone)]
pub struct GenerationChain {
    primary: Arc<dyn Generator>,
    secondary: Option<Arc<dyn Generator>>,
}

impl GenerationChain {
    pub fn new(primary: Arc<dyn Generator>, secondary: Option<Arc<dyn Generator>>) -> Self { Self { primary, secondary } }

    /// One bounded attempt on the primary, then at most one on the secondary.
    /// The error carries the last failure.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, Error> {
        let first = attempt(self.primary.as_ref(), request).await;
        let err = match first {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };
        let Some(secondary) = &self.secondary else {
            warn!(generator = self.primary.name(), error = %err, "generation failed; no secondary configured");
            return Err(err);
        };
        warn!(generator = self.primary.name(), error = %err, fallback = secondary.name(), "primary generation failed");
        let second = attempt(secondary.as_ref(), request).await;
        if let Err(e) = &second {
            warn!(generator = secondary.name(), error = %e, "secondary generation failed");
        }
        second
    }
}

async fn attempt(generator: &dyn Generator, request: &GenerationRequest) -> Result<String, Error> {
    match timeout(request.timeout, generator.generate(request)).await {
        Ok(Ok(text)) => {
            info!(generator = generator.name(), chars = text.len(), "generation complete");
            Ok(text)
        }
        Ok(Err(e)) => Err(Error::Generation(format!("{}: {e:#}", generator.name()))),
        Err(_) => Err(Error::GenerationTimeout(request.timeout)),
    }
}
