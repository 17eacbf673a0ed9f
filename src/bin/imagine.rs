use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use log::{debug, error, info};
use std::path::PathBuf;
use std::time::Instant;

use image_engines::core::AppConfig;
use image_engines::features::image_gen::build_named_engine;
use image_engines::{
    Identity, ImageOutcome, ImageQuality, ImageStyle, ImagineRequest, Orientation,
};

/// Generate an image from a text prompt.
///
/// Inline directives such as `--hd`, `--vertical` or `--seed 42` may be
/// placed inside the prompt after `--`.
#[derive(Debug, Parser)]
#[command(name = "imagine", version)]
struct Args {
    /// YAML config file (default: $IMAGE_ENGINES_CONFIG or image_engines.yaml)
    #[arg(long)]
    config: Option<String>,

    /// Engine to use instead of image_generation.engine
    #[arg(long)]
    engine: Option<String>,

    /// Caller identity used for rate limiting
    #[arg(long, default_value = "cli")]
    user: String,

    /// Pixel size (dalle) or aspect ratio (stability)
    #[arg(long)]
    size: Option<String>,

    #[arg(long)]
    style: Option<String>,

    #[arg(long)]
    quality: Option<String>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    negative: Option<String>,

    /// Output format (stability: jpeg, png, webp)
    #[arg(long)]
    format: Option<String>,

    /// Run as a tool call (landscape or portrait) instead of a user request
    #[arg(long)]
    orientation: Option<String>,

    /// Print the provider's revised prompt
    #[arg(long)]
    revision: bool,

    /// Where to write the image (default: image.<ext>)
    #[arg(long)]
    out: Option<PathBuf>,

    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    prompt: Vec<String>,
}

impl Args {
    fn orientation(&self) -> Result<Option<Orientation>> {
        self.orientation
            .as_deref()
            .map(|raw| {
                Orientation::parse(raw)
                    .with_context(|| format!("Unknown orientation '{raw}' (landscape, portrait)"))
            })
            .transpose()
    }

    fn style(&self) -> Result<Option<ImageStyle>> {
        self.style
            .as_deref()
            .map(|raw| {
                ImageStyle::parse(raw)
                    .with_context(|| format!("Unknown style '{raw}' (natural, vivid)"))
            })
            .transpose()
    }

    fn to_request(&self) -> Result<ImagineRequest> {
        let mut request =
            ImagineRequest::new(self.prompt.join(" "), Identity::from(self.user.as_str()))
                .with_revision(self.revision);

        if let Some(size) = &self.size {
            request = request.with_size(size);
        }
        if let Some(style) = self.style()? {
            request = request.with_style(style);
        }
        if let Some(quality) = &self.quality {
            let quality = ImageQuality::parse(quality)
                .with_context(|| format!("Unknown quality '{quality}' (standard, hd)"))?;
            request = request.with_quality(quality);
        }
        if let Some(seed) = self.seed {
            request = request.with_seed(seed);
        }
        if let Some(negative) = &self.negative {
            request = request.with_negative_prompt(negative);
        }
        if let Some(format) = &self.format {
            request = request.with_output_format(format);
        }
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(AppConfig::path_from_env);
    let config = AppConfig::load(&config_path)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.log_level),
    )
    .init();

    info!("Loaded config from {config_path}");

    let engine_name = args
        .engine
        .clone()
        .map(|name| name.to_lowercase())
        .unwrap_or_else(|| config.engine_name());
    let engine = build_named_engine(&config, &engine_name)?;

    debug!("Starting image generation | Engine: {}", engine.name());
    let start_time = Instant::now();
    let outcome = match args.orientation()? {
        Some(orientation) => {
            let prompt = args.prompt.join(" ");
            engine
                .generate_image(Some(&prompt), Some(orientation), args.style()?)
                .await
                .unwrap_or(ImageOutcome::Unexpected)
        }
        None => engine.imagine(args.to_request()?).await,
    };
    let (image, message) = outcome.into_parts();
    info!("Image generation finished | Time: {:?}", start_time.elapsed());

    let Some(image) = image else {
        match message {
            Some(message) => eprintln!("{message}"),
            None => eprintln!("Image generation failed. See the log for details."),
        }
        std::process::exit(1);
    };

    let bytes = image.decode()?;
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(format!("image.{}", image.extension())));
    std::fs::write(&out, &bytes).map_err(|e| {
        error!("Failed to write image to {}: {e}", out.display());
        anyhow::anyhow!("Failed to write image: {}", e)
    })?;

    println!("Saved {} ({} bytes)", out.display(), bytes.len());
    if let Some(revision) = message {
        println!("{revision}");
    }

    Ok(())
}
