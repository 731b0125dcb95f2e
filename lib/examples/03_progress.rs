use neural_style as ns;

fn main() -> Result<(), ns::Error> {
    let session = ns::Session::builder()
        .content(&"imgs/tom.jpg")
        .style(&"imgs/starry_night.jpg")
        .max_size(256)
        .steps(200)
        // a stronger smoothness penalty for less high frequency noise
        .tv_weight(1e-3)
        .weights_file(&"vgg19.safetensors")
        .build()?;

    // closures work as progress callbacks, they are called on this thread
    // every 20 steps here, and once more on the last step
    let progress = |update: ns::ProgressUpdate<'_>| {
        println!(
            "step {}/{} loss {:.4}",
            update.step, update.total_steps, update.loss.total
        );

        let _ = update.image.save(format!("out/03_step_{:03}.png", update.step));
    };

    let stylized = session.run(Some(Box::new(progress)))?;
    stylized.save("out/03.jpg")
}
