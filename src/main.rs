use color_eyre::Result;
use spriteboard::app::App;

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let validation = std::env::args().any(|arg| arg == "--validate");

    let app = App::new(validation)?;
    app.run()?;

    Ok(())
}
