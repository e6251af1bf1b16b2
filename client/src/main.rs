mod config;

use crate::config::{AlgorithmChoice, Config};
use anyhow::{anyhow, Result};
use clap::Parser;
use imgquant_core::{palette_from_tuples, stderr_progress, Algorithm, Image};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short = 'i', long)]
    input: String,
    #[arg(short = 'o', long)]
    output: String,
    #[arg(short = 'a', long, value_enum)]
    algorithm: Option<CliAlgorithm>,
    #[arg(short = 'p', long)]
    palette_size: Option<usize>,
    #[arg(short = 'd', long = "use-dithering", default_value = "false")]
    use_dithering: bool,
    #[arg(short = 'm', long = "use-median-cut-for-nearest-color", default_value = "false")]
    use_median_cut_for_nearest_color: bool,
    #[arg(long = "dump-palette", default_value = "false")]
    dump_palette: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
enum CliAlgorithm {
    KMeans,
    MedianCut,
    Octree,
}

fn resolve_algorithm(config: &Config, cli_choice: Option<CliAlgorithm>) -> AlgorithmChoice {
    match cli_choice {
        Some(CliAlgorithm::KMeans) => AlgorithmChoice::KMeans,
        Some(CliAlgorithm::MedianCut) => AlgorithmChoice::MedianCut,
        Some(CliAlgorithm::Octree) => AlgorithmChoice::Octree,
        None => config.algorithm.clone(),
    }
}

fn main() -> Result<()> {
    println!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    let args = Args::parse();
    let config = Config::load()?;
    if !config.is_valid() {
        return Err(anyhow!("Config is not valid."));
    }

    let algorithm_choice = resolve_algorithm(&config, args.algorithm);
    let palette_size = args.palette_size.unwrap_or(config.palette_size);
    let use_dithering = config.use_dithering || args.use_dithering;
    let use_median_cut_for_nearest_color =
        config.use_median_cut_for_nearest_color || args.use_median_cut_for_nearest_color;

    let algorithm = match algorithm_choice {
        AlgorithmChoice::KMeans => Algorithm::KMeans,
        AlgorithmChoice::Octree => Algorithm::Octree,
        AlgorithmChoice::MedianCut => Algorithm::MedianCut {
            use_fast_lookup: use_median_cut_for_nearest_color,
        },
    };

    println!("Loading image...");
    let image = Image::new(&args.input)?;

    println!("Quantizing image...");
    let mut progress = stderr_progress("Quantizing", std::time::Duration::from_millis(200));
    let output = if config.use_custom_palette {
        println!("Using custom palette...");
        let palette = palette_from_tuples(&config.custom_palette);
        image.quantize_with_palette(palette, use_dithering, Some(&mut progress))?
    } else {
        image.quantize(algorithm, palette_size, use_dithering, Some(&mut progress))?
    };

    if args.dump_palette {
        println!("Saving palette to palette.png");
        output.palette.save("./palette.png")?;
    }

    println!("Saving to {}", args.output);
    let rendered = image.render_indexed(&output);
    Image::save(&args.output, &rendered)?;

    println!("Done.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_input_and_output() {
        let args = Args::try_parse_from(["imgquant", "-i", "in.png", "-o", "out.png"]).unwrap();
        assert_eq!(args.input, "in.png");
        assert_eq!(args.output, "out.png");
        assert!(args.algorithm.is_none());
        assert!(!args.dump_palette);
    }

    #[test]
    fn parses_all_overrides() {
        let args = Args::try_parse_from([
            "imgquant",
            "--input",
            "in.png",
            "--output",
            "out.png",
            "--algorithm",
            "octree",
            "--palette-size",
            "32",
            "--use-dithering",
            "--dump-palette",
        ])
        .unwrap();
        assert_eq!(args.palette_size, Some(32));
        assert!(matches!(args.algorithm, Some(CliAlgorithm::Octree)));
        assert!(args.use_dithering);
        assert!(args.dump_palette);
    }

    #[test]
    fn missing_required_input_fails_to_parse() {
        let result = Args::try_parse_from(["imgquant", "-o", "out.png"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_algorithm_overrides_config_default() {
        let config = Config::default();
        let resolved = resolve_algorithm(&config, Some(CliAlgorithm::Octree));
        assert_eq!(resolved, AlgorithmChoice::Octree);
    }

    #[test]
    fn missing_cli_algorithm_falls_back_to_config() {
        let config = Config {
            algorithm: AlgorithmChoice::KMeans,
            ..Config::default()
        };
        let resolved = resolve_algorithm(&config, None);
        assert_eq!(resolved, AlgorithmChoice::KMeans);
    }
}
