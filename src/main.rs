//! Capcam binary: capture still images from a webcam.

use std::fmt::Write as _;
use std::process::ExitCode;

use anyhow::Context;
use capcam::catalog::DeviceCatalog;
use capcam::{
    run_capture, CapCamError, CaptureRequest, ImageFileWriter, SystemClock, V4L2Backend, Verbosity,
};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

/// Exit code for recognized user or configuration errors.
const EXIT_USER_ERROR: u8 = 8;
/// Exit code for unexpected internal errors.
const EXIT_INTERNAL_ERROR: u8 = 9;

const EXAMPLES: &str = "Examples:
  capcam 0
  capcam camera -d4 -fbmp -oimage-100.jpg
  capcam \"usb camera\" -d4 -o\"image 100.jpg\"";

#[derive(Parser, Debug)]
#[command(
    name = "capcam",
    version,
    about = "Capture image from webcam with maximum resolution",
    before_help = "Device name is case-insensitive, a substring is ok. \
        Increase the delay if the first image is black. \
        The image filename is auto-generated unless -o is given."
)]
struct Cli {
    /// Device index or case-insensitive name substring
    device: Option<String>,

    /// Delay in seconds before each check for the first frame (0-11)
    #[arg(short = 'd', default_value_t = 2, allow_negative_numbers = true)]
    delay: i64,

    /// Resolution index instead of the maximum resolution
    #[arg(short = 'r')]
    resolution: Option<usize>,

    /// Number of images to capture
    #[arg(short = 'n', default_value_t = 1, allow_negative_numbers = true)]
    number: i64,

    /// Seconds to wait after each capture
    #[arg(short = 'w', default_value_t = 1, allow_negative_numbers = true)]
    wait: i64,

    /// Image format: jpg, png or bmp
    #[arg(short = 'f', default_value = "jpg")]
    format: String,

    /// Image output filename
    #[arg(short = 'o')]
    output: Option<String>,

    /// Quiet mode, only errors are printed
    #[arg(short = 'q')]
    quiet: bool,
}

impl Cli {
    fn into_request(self, device: String) -> CaptureRequest {
        CaptureRequest {
            device,
            settle_delay_secs: self.delay,
            resolution: self.resolution,
            shot_count: self.number,
            inter_shot_secs: self.wait,
            format: self.format,
            output: self.output,
            verbosity: if self.quiet {
                Verbosity::Quiet
            } else {
                Verbosity::Normal
            },
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.kind() == ErrorKind::DisplayHelp => return print_help(),
        Err(err) => {
            let _ = err.print();
            return if err.kind() == ErrorKind::DisplayVersion {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_USER_ERROR)
            };
        }
    };

    let Some(device) = cli.device.clone() else {
        return print_help();
    };
    let request = cli.into_request(device);
    init_tracing(request.verbosity);

    match run(&request) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let user_error = err
                .downcast_ref::<CapCamError>()
                .is_some_and(CapCamError::is_user_error);
            ExitCode::from(if user_error {
                EXIT_USER_ERROR
            } else {
                EXIT_INTERNAL_ERROR
            })
        }
    }
}

fn run(request: &CaptureRequest) -> anyhow::Result<()> {
    tracing::info!(
        "Capture image from webcam with maximum resolution (V{})",
        env!("CARGO_PKG_VERSION")
    );
    let report = run_capture(&V4L2Backend, request, &SystemClock, &ImageFileWriter)?;
    tracing::info!(
        saved = report.saved_count(),
        requested = report.shots.len(),
        "done"
    );
    Ok(())
}

fn init_tracing(verbosity: Verbosity) {
    let filter = match verbosity {
        Verbosity::Quiet => EnvFilter::new(verbosity.filter_directive()),
        Verbosity::Normal => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive())),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}

/// Print the help, including the cameras attached right now.
fn print_help() -> ExitCode {
    let footer = format!("{EXAMPLES}\n\n{}", camera_listing());
    let _ = Cli::command().after_help(footer).print_help();
    ExitCode::SUCCESS
}

/// Index and name of every attached camera.
fn camera_listing() -> String {
    let mut listing = String::from("Cameras:\n");
    match DeviceCatalog::enumerate(&V4L2Backend).context("enumerating cameras") {
        Ok(catalog) if !catalog.devices().is_empty() => {
            for device in catalog.devices() {
                let _ = writeln!(listing, "{:>3}: {}", device.index, device.name);
            }
        }
        Ok(_) => listing.push_str("  no cameras\n"),
        Err(err) => {
            let _ = writeln!(listing, "  {err:#}");
        }
    }
    listing
}
