//! Stage 6: the egress formatter. Reshapes image results into the object-list
//! egress form, mapping class ids through the label table.

use anyhow::{Result, anyhow};
use log::warn;
use tilefan_core::{DetectedObject, ImageObjects, ImageResult};
use tokio::sync::mpsc;

fn format_result(result: ImageResult, labels: &[String]) -> ImageObjects {
	let objects = result
		.rboxes
		.iter()
		.zip(&result.labels)
		.map(|(rbox, &class)| DetectedObject {
			label: labels.get(class as usize).cloned().unwrap_or_else(|| {
				warn!("class id {class} has no label, emitting a placeholder");
				format!("class_{class}")
			}),
			coords: rbox.coords(),
			confidence: rbox.confidence(),
		})
		.collect();
	ImageObjects {
		image: result.name,
		objects,
	}
}

pub(crate) async fn run_formatter(
	mut input: mpsc::Receiver<Option<ImageResult>>,
	egress: mpsc::Sender<Option<ImageObjects>>,
	labels: Vec<String>,
) -> Result<()> {
	while let Some(Some(result)) = input.recv().await {
		egress
			.send(Some(format_result(result, &labels)))
			.await
			.map_err(|_| anyhow!("egress queue closed"))?;
	}
	// terminal sentinel
	egress
		.send(None)
		.await
		.map_err(|_| anyhow!("egress queue closed during shutdown"))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;
	use tilefan_core::RBox;

	#[test]
	fn results_map_through_the_label_table() {
		let result = ImageResult {
			name: "img.png".to_string(),
			rboxes: vec![
				RBox::new([0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], 0.9),
				RBox::new([1.0; 8], 0.4),
			],
			labels: vec![1, 0],
		};
		let labels = vec!["plane".to_string(), "ship".to_string()];

		let record = format_result(result, &labels);
		assert_eq!(
			record,
			ImageObjects {
				image: "img.png".to_string(),
				objects: vec![
					DetectedObject {
						label: "ship".to_string(),
						coords: [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
						confidence: 0.9,
					},
					DetectedObject {
						label: "plane".to_string(),
						coords: [1.0; 8],
						confidence: 0.4,
					},
				],
			}
		);
	}

	#[test]
	fn unknown_class_ids_get_a_placeholder_label() {
		let result = ImageResult {
			name: "x".to_string(),
			rboxes: vec![RBox::new([0.0; 8], 0.1)],
			labels: vec![9],
		};
		let record = format_result(result, &["only".to_string()]);
		assert_eq!(record.objects[0].label, "class_9");
	}

	#[test]
	fn empty_results_become_empty_object_lists() {
		let result = ImageResult {
			name: "empty".to_string(),
			rboxes: vec![],
			labels: vec![],
		};
		let record = format_result(result, &[]);
		assert_eq!(record.image, "empty");
		assert!(record.objects.is_empty());
	}
}
