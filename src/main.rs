extern crate log;
pub mod config;
pub mod geofile;
pub mod geometry;
pub mod pipeline;
pub mod rgi;
use crate::config::Config;
use crate::geofile::gdal_geofile::read_features_from_geofile;
use crate::geometry::overlap::OverlapParams;
use crate::pipeline::{
    dissolve::dissolve_file, overlaps::find_overlaps_in_file, within::filter_within_file,
    RunOptions, RunOutcome,
};
use crate::rgi::regions::{region_shapefile, RgiRegion};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Overlap detection, dissolving and region lookup for GLIMS and RGI glacier outlines.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to an optional YAML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Quiet mode. Don't print status messages.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find polygons that overlap other polygons and save only those.
    Overlaps {
        /// Input vector file.
        #[arg(short, long)]
        infile: PathBuf,

        /// Output vector file, written with the input's driver.
        #[arg(short, long, default_value = "overlaps.shp")]
        outfile: PathBuf,

        /// Threshold of degree of overlap for inclusion, in [0.0, 1.0].
        #[arg(short, long, default_value_t = 0.1, value_parser = validated_thresh)]
        thresh: f64,

        /// Use minimum overlap fraction rather than maximum.
        #[arg(short = 'm', long = "use_min")]
        use_min: bool,

        /// Store both overlapping shapes rather than just the first one.
        #[arg(short, long)]
        both: bool,

        /// Do nothing if the output file already exists.
        #[arg(long)]
        skip_existing: bool,
    },
    /// Merge touching and overlapping polygons into regions with sequential ids.
    Dissolve {
        /// Input vector file.
        #[arg(short, long)]
        infile: PathBuf,

        /// Output vector file, written with the input's driver.
        #[arg(short, long)]
        outfile: PathBuf,

        /// Do nothing if the output file already exists.
        #[arg(long)]
        skip_existing: bool,
    },
    /// Keep the polygons lying within the first polygon of a container file.
    Within {
        /// Input vector file.
        #[arg(short, long)]
        infile: PathBuf,

        /// Vector file whose first feature is the container polygon.
        #[arg(short, long)]
        container: PathBuf,

        /// Output vector file, written with the input's driver.
        #[arg(short, long)]
        outfile: PathBuf,

        /// Do nothing if the output file already exists.
        #[arg(long)]
        skip_existing: bool,
    },
    /// Locate and read the shapefile of an RGI 6.0 region.
    Region {
        /// Region number, 1 to 19.
        number: u8,
    },
}

fn validated_thresh(value: &str) -> Result<f64, String> {
    let thresh: f64 = value
        .parse()
        .map_err(|_| format!("{:?} not a floating-point literal", value))?;
    if !(0.0..=1.0).contains(&thresh) {
        return Err(format!("{} not in range [0.0, 1.0]", thresh));
    }
    Ok(thresh)
}

fn print_count(quiet: bool, message: &str, outcome: RunOutcome) {
    if let RunOutcome::Written { count } = outcome {
        if !quiet {
            println!("{}: {}", message, count);
        }
    }
}

fn try_main(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(config_filepath) => Config::load(config_filepath)?,
        None => Config::default(),
    };
    log::debug!("{:?}", config);
    let show_progress = config.show_progress && !args.quiet;
    log::info!("Arguments: {:?}", args.command);

    match args.command {
        Command::Overlaps {
            infile,
            outfile,
            thresh,
            use_min,
            both,
            skip_existing,
        } => {
            let params = OverlapParams {
                threshold: thresh,
                use_min,
                keep_both: both,
            };
            let options = RunOptions {
                show_progress,
                skip_existing,
            };
            let outcome = find_overlaps_in_file(&infile, &outfile, &params, &options)?;
            print_count(args.quiet, "Number of overlapping shapes", outcome);
        }
        Command::Dissolve {
            infile,
            outfile,
            skip_existing,
        } => {
            let options = RunOptions {
                show_progress,
                skip_existing,
            };
            let outcome = dissolve_file(&infile, &outfile, &options)?;
            print_count(args.quiet, "Number of dissolved polygons", outcome);
        }
        Command::Within {
            infile,
            container,
            outfile,
            skip_existing,
        } => {
            let options = RunOptions {
                show_progress,
                skip_existing,
            };
            let outcome = filter_within_file(&infile, &container, &outfile, &options)?;
            print_count(args.quiet, "Number of shapes within container", outcome);
        }
        Command::Region { number } => {
            let region = RgiRegion::from_number(number)?;
            let shapefile = region_shapefile(&config.rgi_data_dir, number)?;
            let collection = read_features_from_geofile(&shapefile)?;
            if !args.quiet {
                println!(
                    "{} ({:?}): {} glaciers",
                    region.stem(),
                    shapefile,
                    collection.len()
                );
            }
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    let default_filter = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    if let Err(e) = try_main(args) {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use rstest::rstest;

    use super::{validated_thresh, Args, Command};

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[rstest]
    #[case("0.0", Some(0.0))]
    #[case("0.35", Some(0.35))]
    #[case("1", Some(1.0))]
    #[case("1.01", None)]
    #[case("-0.1", None)]
    #[case("NaN", None)]
    #[case("lots", None)]
    fn test_validated_thresh(#[case] value: &str, #[case] expected: Option<f64>) {
        assert_eq!(validated_thresh(value).ok(), expected);
    }

    #[test]
    fn test_overlaps_arguments() {
        let args = Args::try_parse_from([
            "glacier_tools",
            "overlaps",
            "-i",
            "glims.shp",
            "--use_min",
            "-b",
            "-t",
            "0.3",
            "-q",
        ])
        .unwrap();
        assert!(args.quiet);
        match args.command {
            Command::Overlaps {
                infile,
                outfile,
                thresh,
                use_min,
                both,
                skip_existing,
            } => {
                assert_eq!(infile.to_str(), Some("glims.shp"));
                assert_eq!(outfile.to_str(), Some("overlaps.shp"));
                assert_eq!(thresh, 0.3);
                assert!(use_min);
                assert!(both);
                assert!(!skip_existing);
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_thresh_is_rejected() {
        let result = Args::try_parse_from([
            "glacier_tools",
            "overlaps",
            "--infile",
            "glims.shp",
            "--thresh",
            "1.5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_infile_is_required() {
        assert!(Args::try_parse_from(["glacier_tools", "dissolve", "-o", "out.shp"]).is_err());
    }
}
