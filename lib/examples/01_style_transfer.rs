fn main() -> Result<(), neural_style::Error> {
    //create a new session
    let session = neural_style::Session::builder()
        //the image whose layout we keep
        .content(&"imgs/tom.jpg")
        //the image whose brushwork and colors we borrow
        .style(&"imgs/starry_night.jpg")
        //keep the optimization cheap enough for a cpu
        .max_size(384)
        .steps(150)
        //the torchvision vgg19 checkpoint, converted to safetensors
        .weights_file(&"vgg19.safetensors")
        .build()?;

    //stylize the content image
    let stylized = session.run(None)?;

    //save the image to the disk
    stylized.save("out/01.jpg")
}
