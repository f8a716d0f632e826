//! Drives one generation from the upstream text stream to its result.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::store::{GenerationStore, RecordingSink};
use crate::ai::{format_generation_request, AiError, AiProvider, TextStream, CODEGEN_SYSTEM_PROMPT};
use crate::config::ParserConfig;
use crate::dispatch::{CapabilityRegistry, FileWriter};
use crate::parser::{EventSink, GenerationResult, StreamProcessor};

/// Error type for a generation that did not finish normally.
#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    /// The provider failed before or during the stream.
    #[error(transparent)]
    Upstream(#[from] AiError),
    /// The caller aborted the generation.
    #[error("Generation cancelled")]
    Cancelled,
}

/// Feed a text stream through a processor until it ends.
///
/// On normal end of stream the processor is finalized and its result
/// returned. An upstream error is reported once through the processor's
/// sink and aborts without finalizing; so does cancellation, which emits
/// nothing. Each chunk's extraction pass completes before the next chunk
/// is read.
///
/// # Errors
///
/// Returns `GenerationError::Upstream` if the stream yields an error and
/// `GenerationError::Cancelled` if `cancel` fires first.
pub async fn drive<S: EventSink>(
    mut stream: TextStream,
    processor: &mut StreamProcessor<S>,
    cancel: &CancellationToken,
) -> Result<GenerationResult, GenerationError> {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::info!("Generation cancelled, discarding buffered output");
                return Err(GenerationError::Cancelled);
            }
            chunk = stream.next() => match chunk {
                Some(Ok(text)) => processor.process_chunk(&text).await,
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Upstream stream failed");
                    processor.fail(&e.to_string());
                    return Err(e.into());
                }
                None => return Ok(processor.finalize().await),
            }
        }
    }
}

/// Runs generations against one provider, writer and capability set.
pub struct Generator {
    provider: Arc<dyn AiProvider>,
    writer: Arc<dyn FileWriter>,
    registry: Arc<CapabilityRegistry>,
    parser: ParserConfig,
}

impl Generator {
    #[must_use]
    pub fn new(
        provider: Arc<dyn AiProvider>,
        writer: Arc<dyn FileWriter>,
        registry: Arc<CapabilityRegistry>,
        parser: ParserConfig,
    ) -> Self {
        Self {
            provider,
            writer,
            registry,
            parser,
        }
    }

    /// A fresh processor reporting to `sink`.
    #[must_use]
    pub fn processor<S: EventSink>(&self, sink: S) -> StreamProcessor<S> {
        StreamProcessor::new(
            &self.parser,
            Arc::clone(&self.writer),
            Arc::clone(&self.registry),
            sink,
        )
    }

    /// Request a generation for `prompt` and process it to completion.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Upstream` if the provider rejects the
    /// request or the stream fails, and `GenerationError::Cancelled` if
    /// `cancel` fires first.
    pub async fn generate<S: EventSink>(
        &self,
        prompt: &str,
        processor: &mut StreamProcessor<S>,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationError> {
        let request = format_generation_request(prompt, &self.registry.names());

        let opened = tokio::select! {
            biased;

            () = cancel.cancelled() => return Err(GenerationError::Cancelled),
            opened = self.provider.stream(CODEGEN_SYSTEM_PROMPT, &request) => opened,
        };
        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "Provider rejected generation request");
                processor.fail(&e.to_string());
                return Err(e.into());
            }
        };

        drive(stream, processor, cancel).await
    }

    /// Start a generation in the background, recording into `store`.
    ///
    /// Returns the generation id immediately.
    pub fn spawn(self: &Arc<Self>, store: &Arc<GenerationStore>, prompt: String) -> Uuid {
        let (id, cancel) = store.create(&prompt);
        let generator = Arc::clone(self);
        let store = Arc::clone(store);

        tokio::spawn(async move {
            let mut processor = generator.processor(RecordingSink::new(Arc::clone(&store), id));
            match generator.generate(&prompt, &mut processor, &cancel).await {
                Ok(result) => {
                    tracing::info!(
                        %id,
                        files = result.total_files,
                        errors = result.errors.len(),
                        "Generation completed"
                    );
                    store.complete(id, result);
                }
                // The store already marked it cancelled.
                Err(GenerationError::Cancelled) => {}
                Err(e) => store.fail(id, e.to_string()),
            }
        });

        id
    }
}
