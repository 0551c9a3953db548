//! Derivative generation for a single trigger: ingress, naming, the per-width
//! transform loop and the summary handed back to the caller.
//!
//! Widths are processed one after another in ascending order. The source is
//! fetched at most once, and only when some width actually needs rendering.
//! The existence check followed by the upload is not atomic: two invocations
//! sharing a `DerivedName` could both render the same width. Names carry a
//! random token, so in practice only retries inside one invocation share one.

use image::DynamicImage;
use tracing::{error, info};

use crate::config::Config;
use crate::error::PipelineError;
use crate::event::{self, EligibleSource, Rejection, TriggerEvent};
use crate::image::{load, transform, TransformCfg};
use crate::naming::{DerivedName, OutputFormat, OutputSpec};
use crate::response::{Outcome, ProcessingResult};
use crate::scratch::Scratch;
use crate::storage::ObjectStore;

/// Runs the whole pipeline for one trigger. Never errors: fatal problems come
/// back as [`Outcome::Failed`].
pub async fn handle<S>(event: &TriggerEvent, store: &S, cfg: &Config) -> Outcome
where
    S: ObjectStore + ?Sized,
{
    let source = match event::admit(event, cfg) {
        Ok(source) => source,
        Err(Rejection::OutsidePrefix { key }) => {
            info!("Skipping non-source file: {}", key);
            return Outcome::SkippedIneligible { key };
        }
        Err(Rejection::UnsupportedType { extension }) => {
            info!("Skipping unsupported file type: {:?}", extension);
            return Outcome::SkippedUnsupportedType { extension };
        }
    };

    let name = DerivedName::derive(source.stem());

    match process(&source, &name, store, cfg).await {
        Ok(result) => {
            info!(
                "Processing complete: {} ({} new derivatives)",
                result.original_location,
                result.processed_locations.len()
            );
            Outcome::Processed(result)
        }
        Err(err) => {
            error!("Failed to process {}: {}", source.location(), err);
            Outcome::Failed {
                reason: err.to_string(),
            }
        }
    }
}

/// Renders every configured width for `source` under `name` and summarizes
/// the result. The scratch directory is released on every path.
pub async fn process<S>(
    source: &EligibleSource,
    name: &DerivedName,
    store: &S,
    cfg: &Config,
) -> Result<ProcessingResult, PipelineError>
where
    S: ObjectStore + ?Sized,
{
    let scratch = Scratch::new(cfg.scratch_dir.as_deref())?;
    let generated = transform_img(source, name, store, cfg, &scratch).await;
    scratch.release();

    let format = OutputFormat::for_source(source.is_png());

    Ok(ProcessingResult {
        original_location: source.location(),
        processed_locations: generated?,
        original_filename: source.file_name().to_string(),
        sanitized_filename: format!("{}{}", name.full_base, format.extension()),
    })
}

/// The per-width loop. Returns the locations written, in width order; widths
/// whose output already exists are skipped and left out.
pub async fn transform_img<S>(
    source: &EligibleSource,
    name: &DerivedName,
    store: &S,
    cfg: &Config,
    scratch: &Scratch,
) -> Result<Vec<String>, PipelineError>
where
    S: ObjectStore + ?Sized,
{
    let format = OutputFormat::for_source(source.is_png());
    let mut original_img: Option<DynamicImage> = None;
    let mut generated_images = vec![];

    for &width in &cfg.target_widths {
        let spec = OutputSpec::new(&cfg.output_prefix, name, width, format);

        let exists = store
            .exists(&source.bucket, &spec.output_key)
            .await
            .map_err(|err| PipelineError::ExistenceCheck {
                key: spec.output_key.clone(),
                source: err,
            })?;

        if exists {
            info!("Skipping already processed image: {}", spec.output_key);
            continue;
        }

        let img = match original_img.take() {
            Some(img) => img,
            None => fetch_source(source, store, scratch).await?,
        };

        let transform_cfg = TransformCfg::new(width, format, cfg.jpeg_quality);
        let transformed_img = scratch
            .render(|writer| {
                transform(&img, transform_cfg, writer)
                    .map_err(|err| PipelineError::Encode { width, source: err })
            })
            .await?;
        original_img = Some(img);

        store
            .put(
                &source.bucket,
                &spec.output_key,
                transformed_img,
                format.content_type(),
            )
            .await
            .map_err(|err| PipelineError::Upload {
                key: spec.output_key.clone(),
                source: err,
            })?;

        info!("Uploaded: {}", spec.output_key);
        generated_images.push(format!("s3://{}/{}", source.bucket, spec.output_key));
    }

    Ok(generated_images)
}

async fn fetch_source<S>(
    source: &EligibleSource,
    store: &S,
    scratch: &Scratch,
) -> Result<DynamicImage, PipelineError>
where
    S: ObjectStore + ?Sized,
{
    info!("Fetching source: {}", source.location());

    let original = store
        .get(&source.bucket, &source.object_key)
        .await
        .map_err(|err| PipelineError::Fetch {
            key: source.object_key.clone(),
            source: err,
        })?;
    let path = scratch.store_source(&original).await?;

    load(&path).map_err(PipelineError::Decode)
}
