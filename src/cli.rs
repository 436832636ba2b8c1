use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::ocr::Rectangle;

#[derive(Debug, Parser)]
#[command(
    name = "htc2-reader",
    about = "Read temperature and humidity from HTC-2 hygrometer photos",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Override the configuration file path
    #[arg(long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tesseract executable, overriding the configuration
    #[arg(long = "tesseract", global = true, value_name = "PATH")]
    pub tesseract: Option<PathBuf>,

    /// Log debug messages
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read a single photo and print the result
    Process {
        image: PathBuf,

        /// ROI coordinate file, overriding the configuration
        #[arg(long = "roi", value_name = "FILE")]
        roi: Option<PathBuf>,

        /// Display rectangle to split into top and bottom halves
        #[arg(long = "display", value_name = "X,Y,W,H")]
        display: Option<Rectangle>,

        /// Save debug images
        #[arg(long = "debug")]
        debug: bool,
    },

    /// Read every photo in a folder and write a CSV report
    Batch {
        dir: PathBuf,

        /// ROI coordinate file, overriding the configuration
        #[arg(long = "roi", value_name = "FILE")]
        roi: Option<PathBuf>,

        /// Where the CSV file is written
        #[arg(long = "output", value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Store calibrated rectangles for a fixed camera setup
    SaveRoi {
        #[arg(long = "temperature", value_name = "X,Y,W,H")]
        temperature: Rectangle,

        #[arg(long = "humidity", value_name = "X,Y,W,H")]
        humidity: Rectangle,

        /// ROI coordinate file, overriding the configuration
        #[arg(long = "roi", value_name = "FILE")]
        roi: Option<PathBuf>,
    },
}
