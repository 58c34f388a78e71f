use anyhow::{Context, Result, anyhow};
use std::{
	fs::File,
	io::{BufWriter, Write},
	path::{Path, PathBuf},
	sync::Arc,
};
use tilefan_core::{ImageData, ImageJob, PipelineConfig};
use tilefan_pipeline::{DebugDetector, Detector, NullDetector, Pipeline};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// image files to process, in order
	#[arg(required = true)]
	images: Vec<PathBuf>,

	/// pipeline configuration file (YAML)
	#[arg(long, short, value_name = "FILE")]
	config: Option<PathBuf>,

	/// class labels, overriding the configuration file
	#[arg(long, value_delimiter = ',', value_name = "LABEL,LABEL,...")]
	labels: Option<Vec<String>>,

	/// built-in detector to run the pipeline with
	#[arg(long, value_enum, default_value_t = DetectorKind::Null)]
	detector: DetectorKind,

	/// write JSON lines to this file instead of stdout
	#[arg(long, short, value_name = "FILE")]
	output: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum DetectorKind {
	/// never detects anything
	Null,
	/// marks the center of every tile
	Debug,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let config = load_config(arguments)?;
	let detector: Arc<dyn Detector> = match arguments.detector {
		DetectorKind::Null => Arc::new(NullDetector::new(config.class_num())),
		DetectorKind::Debug => Arc::new(DebugDetector::new(config.class_num())),
	};

	let mut pipeline = Pipeline::spawn(&config, detector)?;

	let ingress = pipeline.ingress();
	let images = arguments.images.clone();
	let feeder = tokio::spawn(async move {
		for path in images {
			match load_image(&path) {
				Ok(job) => {
					if ingress.send(Some(job)).await.is_err() {
						break;
					}
				}
				// a broken input drops out of the stream, the pipeline goes on
				Err(e) => log::warn!("skipping '{}': {e:#}", path.display()),
			}
		}
		let _ = ingress.send(None).await;
	});

	let mut writer: Box<dyn Write> = match &arguments.output {
		Some(path) => Box::new(BufWriter::new(
			File::create(path).with_context(|| format!("cannot create '{}'", path.display()))?,
		)),
		None => Box::new(std::io::stdout()),
	};

	let mut count = 0usize;
	while let Some(record) = pipeline.next_result().await {
		serde_json::to_writer(&mut writer, &record)?;
		writer.write_all(b"\n")?;
		count += 1;
	}
	writer.flush()?;

	feeder.await.map_err(|e| anyhow!("image feeder panicked: {e}"))?;
	pipeline.join().await?;

	log::info!("finished, {count} images processed");
	Ok(())
}

fn load_config(arguments: &Subcommand) -> Result<PipelineConfig> {
	let mut config = match &arguments.config {
		Some(path) => {
			let text = std::fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path.display()))?;
			serde_yaml_ng::from_str(&text).with_context(|| format!("cannot parse '{}'", path.display()))?
		}
		None => PipelineConfig::with_labels(vec!["object".to_string()]),
	};
	if let Some(labels) = &arguments.labels {
		config.labels = labels.clone();
	}
	config.validate()?;
	Ok(config)
}

/// Decodes an image file into the BGR byte order the pipeline ingress
/// expects.
fn load_image(path: &Path) -> Result<ImageJob> {
	let decoded = image::open(path)
		.with_context(|| format!("cannot decode '{}'", path.display()))?
		.into_rgb8();
	let (width, height) = decoded.dimensions();
	let mut data = decoded.into_raw();
	for pixel in data.chunks_exact_mut(3) {
		pixel.swap(0, 2);
	}
	Ok(ImageJob {
		name: path.display().to_string(),
		image: ImageData::from_raw(width, height, data)?,
	})
}
