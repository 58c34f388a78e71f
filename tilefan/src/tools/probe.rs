use anyhow::{Context, Result};
use tilefan_core::tile_grid;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// an image file, or plain dimensions as WIDTHxHEIGHT (e.g. 2000x2000)
	#[arg(required = true)]
	input: String,

	/// tile edge length in pixels
	#[arg(long, value_name = "int", default_value_t = 1024)]
	subsize: u32,

	/// overlap between neighbouring tiles in pixels
	#[arg(long, value_name = "int", default_value_t = 200)]
	gap: u32,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let (width, height) = parse_input(&arguments.input)?;
	let tiles = tile_grid(width, height, arguments.subsize, arguments.gap)?;

	println!(
		"{width}x{height} px, subsize {}, gap {}: {} tiles",
		arguments.subsize,
		arguments.gap,
		tiles.len()
	);
	for tile in &tiles {
		println!(
			"  x [{:>5}, {:>5})  y [{:>5}, {:>5})  {}x{}",
			tile.x0,
			tile.x1,
			tile.y0,
			tile.y1,
			tile.width(),
			tile.height()
		);
	}
	Ok(())
}

/// Accepts either `WIDTHxHEIGHT` or a path to an image file.
fn parse_input(input: &str) -> Result<(u32, u32)> {
	if let Some((w, h)) = input.split_once('x')
		&& let (Ok(w), Ok(h)) = (w.parse(), h.parse())
	{
		return Ok((w, h));
	}
	image::image_dimensions(input).with_context(|| format!("cannot read image dimensions of '{input}'"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_plain_dimensions() {
		assert_eq!(parse_input("2000x1500").unwrap(), (2000, 1500));
	}

	#[test]
	fn rejects_nonsense() {
		assert!(parse_input("no-such-file.png").is_err());
		assert!(parse_input("12xab").is_err());
	}

	#[test]
	fn probe_prints_the_grid() {
		let arguments = Subcommand {
			input: "2000x2000".to_string(),
			subsize: 1024,
			gap: 200,
		};
		run(&arguments).unwrap();
	}
}
