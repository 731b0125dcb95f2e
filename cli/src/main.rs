mod progress_window;

use progress_window::ProgressWindow;
use structopt::StructOpt;

use neural_style::{
    image::ImageOutputFormat as ImgFmt, DeviceSelector, Error, Session, TransferProgress,
    VggLayer,
};
use std::path::PathBuf;

fn parse_img_fmt(input: &str) -> Result<ImgFmt, String> {
    let fmt = match input {
        "png" => ImgFmt::Png,
        "jpg" => ImgFmt::Jpeg(75),
        "bmp" => ImgFmt::Bmp,
        other => {
            return Err(format!(
                "image format `{}` not one of: 'png', 'jpg', 'bmp'",
                other
            ))
        }
    };

    Ok(fmt)
}

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
struct Tweaks {
    /// The number of optimization steps, more steps push the output further
    /// toward the style
    #[structopt(long, default_value = "150")]
    steps: u32,
    /// How strongly the output is pulled toward the style statistics
    #[structopt(long, default_value = "1e6")]
    style_weight: f64,
    /// How strongly the output is pulled toward the structure of the content image
    #[structopt(long, default_value = "1.0")]
    content_weight: f64,
    /// How strongly high frequency noise is penalized, raise it if the output
    /// looks grainy
    #[structopt(long, default_value = "1e-4")]
    tv_weight: f64,
    /// The learning rate of the optimizer
    #[structopt(long = "lr", default_value = "0.03")]
    learning_rate: f64,
    /// The layer whose features represent the content, eg. `conv4_2`
    #[structopt(long)]
    content_layer: Option<VggLayer>,
    /// Comma separated layers whose Gram matrices represent the style, eg.
    /// `conv1_1,conv2_1,conv3_1`
    #[structopt(long, use_delimiter = true)]
    style_layers: Vec<VggLayer>,
    #[structopt(long = "window")]
    #[cfg(feature = "progress")]
    #[cfg_attr(feature = "progress", structopt(long = "window"))]
    #[cfg_attr(
        feature = "progress",
        doc = "Show a window with a preview of the image being optimized"
    )]
    show_window: bool,
    /// Don't show a progress bar
    #[structopt(long)]
    no_progress: bool,
}

#[derive(StructOpt)]
#[structopt(
    name = "neural-style",
    about = "Transfers the style of one image onto the content of another",
    rename_all = "kebab-case"
)]
struct Opt {
    /// The image whose structure is kept
    #[structopt(long, parse(from_os_str))]
    content: PathBuf,
    /// The image whose texture and colors are transferred
    #[structopt(long, parse(from_os_str))]
    style: PathBuf,
    /// The path to save the stylized image to, the file extensions of the path determines
    /// the image format used. You may use `-` for stdout.
    #[structopt(long = "out", short, default_value = "stylized.jpg", parse(from_os_str))]
    output_path: PathBuf,
    /// The format to save the stylized image as.
    ///
    /// NOTE: this will only apply when stdout is specified via `-o -`, otherwise the image
    /// format is determined by the file extension of the path provided to `-o`
    #[structopt(
        long,
        default_value = "png",
        parse(try_from_str = parse_img_fmt)
    )]
    out_fmt: ImgFmt,
    /// The input images are shrunk so that neither side exceeds this many pixels
    #[structopt(long, default_value = "384")]
    size: u32,
    /// Path to the VGG19 weights, as `.safetensors`, `.pth` or `.pt`
    #[structopt(long, env = "NEURAL_STYLE_WEIGHTS", parse(from_os_str))]
    weights: PathBuf,
    /// The device to run on, one of `auto`, `cpu`, `cuda[:N]` or `metal[:N]`.
    /// Unavailable devices fall back to the CPU.
    #[structopt(long, default_value = "auto")]
    device: DeviceSelector,
    #[structopt(flatten)]
    tweaks: Tweaks,
}

fn main() {
    env_logger::init();

    if let Err(e) = real_main() {
        let msg = headline(&e);
        if atty::is(atty::Stream::Stderr) {
            eprintln!("\x1b[31merror\x1b[0m: {}", msg);
        } else {
            eprintln!("error: {}", msg);
        }

        std::process::exit(1);
    }
}

/// The first line of an error, tensor errors carry a backtrace after it when
/// `RUST_BACKTRACE` is set
fn headline(err: &Error) -> String {
    err.to_string().lines().next().unwrap_or_default().to_owned()
}

fn real_main() -> Result<(), Error> {
    let args = Opt::from_args();

    // Check that the extension for the path supplied by the user is one of the ones we support
    {
        match args.output_path.extension().and_then(|ext| ext.to_str()) {
            Some("png") | Some("jpg") | Some("jpeg") | Some("bmp") => {}
            None => {}
            Some(other) => return Err(Error::UnsupportedOutputFormat(other.to_owned())),
        }
    }

    let mut sb = Session::builder()
        .content(&args.content)
        .style(&args.style)
        .weights_file(&args.weights)
        .device(args.device)
        .max_size(args.size)
        .steps(args.tweaks.steps)
        .content_weight(args.tweaks.content_weight)
        .style_weight(args.tweaks.style_weight)
        .tv_weight(args.tweaks.tv_weight)
        .learning_rate(args.tweaks.learning_rate);

    if let Some(layer) = args.tweaks.content_layer {
        sb = sb.content_layer(layer);
    }

    if !args.tweaks.style_layers.is_empty() {
        sb = sb.style_layers(&args.tweaks.style_layers);
    }

    let session = sb.build()?;

    let progress: Option<Box<dyn TransferProgress>> = if !args.tweaks.no_progress {
        let progress = ProgressWindow::new(args.tweaks.steps);

        #[cfg(feature = "progress")]
        let progress = {
            if args.tweaks.show_window {
                progress.with_preview()
            } else {
                progress
            }
        };

        Some(Box::new(progress))
    } else {
        None
    };

    let stylized = session.run(progress)?;

    if args.output_path.to_str() == Some("-") {
        let out = std::io::stdout();
        let mut out = out.lock();
        stylized.write(&mut out, args.out_fmt)?;
    } else {
        // This won't respect the output format specified by the user,
        // only the extension on the path they specify
        stylized.save(&args.output_path)?;
        log::info!("saved stylized image to {}", args.output_path.display());
    }

    Ok(())
}
