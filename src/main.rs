//! LED Matrix Uploader CLI
//!
//! Headless client for the uploader API: previews how an image will look
//! on the matrix, uploads it, manages stored images and drives animation
//! playback on the WLED device.
//!
//! ## Architecture
//! - **Library** (`led_matrix_uploader`): rasterizer, encoder, session,
//!   playback controller and HTTP client
//! - **This binary**: parses arguments and prints notices
//!
//! Everything runs on a single-threaded tokio runtime.
//!
//! ## Usage
//! ```sh
//! led-matrix-uploader --base-url http://pi.local:8000 preview cat.png
//! led-matrix-uploader upload cat.png --name "Cat"
//! led-matrix-uploader animate ab12cd34 play
//! ```

use clap::{ArgAction, Args, Parser, Subcommand};
use led_matrix_uploader::client::ApiClient;
use led_matrix_uploader::config::{ConfigUpdate, GeometryCache};
use led_matrix_uploader::encode::encode_png;
use led_matrix_uploader::playback::{PlaybackCommand, PlaybackController};
use led_matrix_uploader::raster::{PREVIEW_SCALE, magnify};
use led_matrix_uploader::session::UploadSession;
use led_matrix_uploader::{Error, Notice, NoticeLevel};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// LED Matrix Uploader
#[derive(Parser)]
#[command(name = "led-matrix-uploader")]
#[command(about = "Upload images to an LED matrix and control animations")]
#[command(version)]
struct Cli {
    /// Base URL of the uploader API
    #[arg(long, default_value = "http://localhost:8000")]
    base_url: String,

    /// Timeout for each request, in seconds
    #[arg(long, default_value = "10")]
    timeout_secs: u64,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether the API is reachable
    Health,
    /// Show or change the remote configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Rasterize an image locally and write the matrix and preview PNGs
    Preview {
        /// Image to rasterize
        file: PathBuf,
        /// Directory for the output files
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Preview magnification per matrix pixel
        #[arg(long, default_value_t = PREVIEW_SCALE)]
        scale: u32,
    },
    /// Rasterize (or pass through, for GIFs) and upload an image
    Upload {
        file: PathBuf,
        /// Display name; defaults to the file name without extension
        #[arg(long)]
        name: Option<String>,
    },
    /// List stored images
    List,
    /// Delete a stored image
    Delete { id: String },
    /// Download a stored file
    Download {
        filename: String,
        /// Output path; defaults to the file name
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show a stored image on the WLED device
    Send { id: String },
    /// Play, pause or stop a stored animation
    Animate {
        id: String,
        /// play, pause or stop
        action: PlaybackCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the current configuration as JSON
    Show,
    /// Update selected configuration fields
    Set(ConfigSetArgs),
}

#[derive(Args)]
struct ConfigSetArgs {
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    wled_ip: Option<String>,
    #[arg(long)]
    wled_port: Option<u16>,
    /// http or https
    #[arg(long)]
    wled_protocol: Option<String>,
    /// 0, 90, 180 or 270
    #[arg(long)]
    wled_rotation: Option<u16>,
    #[arg(long)]
    wled_mirror_v: Option<bool>,
    #[arg(long)]
    wled_mirror_h: Option<bool>,
    #[arg(long = "loop")]
    animation_loop: Option<bool>,
    /// Milliseconds between animation frames
    #[arg(long)]
    frame_delay: Option<u32>,
}

impl From<ConfigSetArgs> for ConfigUpdate {
    fn from(args: ConfigSetArgs) -> Self {
        Self {
            matrix_width: args.width,
            matrix_height: args.height,
            wled_ip: args.wled_ip,
            wled_port: args.wled_port,
            wled_protocol: args.wled_protocol,
            wled_rotation: args.wled_rotation,
            wled_mirror_v: args.wled_mirror_v,
            wled_mirror_h: args.wled_mirror_h,
            animation_loop: args.animation_loop,
            animation_frame_delay: args.frame_delay,
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("led_matrix_uploader={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .compact()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let notice = match run(cli).await {
        Ok(notice) => notice,
        Err(e) => e.to_notice(),
    };

    match notice.level {
        NoticeLevel::Success => {
            println!("{}", notice.message);
            ExitCode::SUCCESS
        }
        NoticeLevel::Warning | NoticeLevel::Danger => {
            eprintln!("{}", notice.message);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Notice, Error> {
    let api = ApiClient::new(&cli.base_url, Duration::from_secs(cli.timeout_secs))?;
    tracing::debug!("Using API at {}", api.base_url());

    match cli.command {
        Command::Health => match api.health().await {
            Ok(()) => Ok(Notice::success("OK")),
            Err(e) => Ok(Notice::danger(format!("ERROR ({e})"))),
        },

        Command::Config(ConfigCommand::Show) => {
            let config = api.fetch_config().await?;
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| Error::validation(e.to_string()))?;
            Ok(Notice::success(json))
        }

        Command::Config(ConfigCommand::Set(args)) => {
            let update = ConfigUpdate::from(args);
            if update.is_empty() {
                return Err(Error::validation("Nothing to update"));
            }
            let saved = api.save_config(&update).await?;
            let mut cache = GeometryCache::default();
            cache.apply(&saved);
            Ok(Notice::success(format!(
                "Configuration saved (matrix {})",
                cache.get()
            )))
        }

        Command::Preview {
            file,
            out_dir,
            scale,
        } => {
            let mut session = UploadSession::default();
            let selection = session.select_file(&api, &file).await?;
            let matrix = &selection.raster.matrix;
            let preview_png = if scale == PREVIEW_SCALE {
                encode_png(&selection.raster.preview)?
            } else {
                encode_png(&magnify(matrix, scale)?)?
            };

            let stem = selection.source.default_display_name();
            let matrix_path = out_dir.join(format!("{stem}_matrix.png"));
            let preview_path = out_dir.join(format!("{stem}_preview.png"));
            tokio::fs::write(&matrix_path, encode_png(matrix)?).await?;
            tokio::fs::write(&preview_path, preview_png).await?;

            Ok(Notice::success(format!(
                "Matrix {} written to {} (preview {})",
                selection.raster.geometry,
                matrix_path.display(),
                preview_path.display()
            )))
        }

        Command::Upload { file, name } => {
            let mut session = UploadSession::default();
            session.select_file(&api, &file).await?;
            if let Some(name) = name {
                session.set_name(name);
            }
            Ok(session.save(&api).await)
        }

        Command::List => {
            let images = api.list_images().await?;
            if images.is_empty() {
                return Ok(Notice::success("No images uploaded"));
            }

            let mut lines = Vec::with_capacity(images.len());
            for image in &images {
                let frames = api.frames_or_still(&image.id).await;
                let kind = if frames.offers_playback() {
                    format!("animation, {} frames", frames.frames.len())
                } else {
                    "still".to_string()
                };
                lines.push(format!(
                    "{}  {}  ({})  {}  {}",
                    image.id, image.name, kind, image.filename, image.uploaded_at
                ));
            }
            Ok(Notice::success(lines.join("\n")))
        }

        Command::Delete { id } => {
            api.delete_image(&id).await?;
            Ok(Notice::success(format!("Deleted {id}")))
        }

        Command::Download { filename, out } => {
            let bytes = api.download(&filename).await?;
            let out = out.unwrap_or_else(|| PathBuf::from(&filename));
            tokio::fs::write(&out, &bytes).await?;
            Ok(Notice::success(format!(
                "Saved {} bytes to {}",
                bytes.len(),
                out.display()
            )))
        }

        Command::Send { id } => {
            let ack = api.send_to_wled(&id).await?;
            Ok(Notice::success(ack.message.unwrap_or_else(|| "Sent!".to_string())))
        }

        Command::Animate { id, action } => {
            let controller = PlaybackController::default();
            let ack = controller.command(&api, &id, action).await?;
            Ok(Notice::success(
                ack.message.unwrap_or_else(|| format!("{action}: OK")),
            ))
        }
    }
}
