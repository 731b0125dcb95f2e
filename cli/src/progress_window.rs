use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "progress")]
use minifb::Window;

pub struct ProgressWindow {
    #[cfg(feature = "progress")]
    preview: Option<Preview>,

    pb: ProgressBar,
}

impl ProgressWindow {
    pub fn new(steps: u32) -> Self {
        let sty = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} {msg}")
            .progress_chars("##-");

        let pb = ProgressBar::new(u64::from(steps));
        pb.set_style(sty);

        Self {
            #[cfg(feature = "progress")]
            preview: None,
            pb,
        }
    }

    /// Opens a window showing the image being optimized. The window is
    /// created on the first update, once the size of the image is known.
    #[cfg(feature = "progress")]
    pub fn with_preview(mut self) -> Self {
        self.preview = Some(Preview {
            window: None,
            pixels: Vec::new(),
        });
        self
    }
}

impl Drop for ProgressWindow {
    fn drop(&mut self) {
        self.pb.finish();
    }
}

impl neural_style::TransferProgress for ProgressWindow {
    fn update(&mut self, update: neural_style::ProgressUpdate<'_>) {
        self.pb.set_position(u64::from(update.step));
        self.pb.set_message(&format!(
            "loss {:.3e} (content {:.3e}, style {:.3e}, tv {:.3e})",
            update.loss.total, update.loss.content, update.loss.style, update.loss.tv
        ));

        #[cfg(feature = "progress")]
        {
            if let Some(ref mut preview) = self.preview {
                preview.show(update.image);
            }
        }
    }
}

#[cfg(feature = "progress")]
struct Preview {
    window: Option<Window>,
    pixels: Vec<u32>,
}

#[cfg(feature = "progress")]
impl Preview {
    fn show(&mut self, image: &neural_style::image::RgbImage) {
        let (width, height) = (image.width() as usize, image.height() as usize);

        if self.window.is_none() {
            match Window::new(
                "Neural Style",
                width,
                height,
                minifb::WindowOptions::default(),
            ) {
                Ok(window) => self.window = Some(window),
                Err(err) => {
                    log::warn!("unable to open preview window: {}", err);
                    return;
                }
            }
        }

        let window = match self.window.as_mut() {
            Some(window) if window.is_open() => window,
            _ => return,
        };

        // minifb wants 0RGB packed into a u32
        self.pixels.clear();
        self.pixels.extend(image.pixels().map(|p| {
            let [r, g, b] = p.0;
            (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
        }));

        // We don't particularly care if this fails
        let _ = window.update_with_buffer(&self.pixels, width, height);
    }
}
