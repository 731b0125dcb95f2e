use neural_style as ns;
use std::sync::Arc;

fn main() -> Result<(), ns::Error> {
    // load the network once, only as deep as the default layers need
    let device = ns::DeviceSelector::Auto.select();
    let model = Arc::new(ns::Vgg19::from_file_through(
        "vgg19.safetensors",
        ns::VggLayer::CONV5_1,
        &device,
    )?);

    // the same network is reused for every style, it is never modified
    for (i, style) in ["imgs/starry_night.jpg", "imgs/wave.jpg"].iter().enumerate() {
        let stylized = ns::Session::builder()
            .model(model.clone())
            .content(&"imgs/tom.jpg")
            .style(style)
            .max_size(256)
            .steps(100)
            .build()?
            .run(None)?;

        stylized.save(format!("out/02_{}.jpg", i))?;
    }

    Ok(())
}
