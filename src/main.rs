use eframe::egui;
use relief::app::ReliefApp;
use relief::cli;
use relief::settings::AppSettings;
use std::path::PathBuf;

fn main() -> Result<(), eframe::Error> {
    let settings = AppSettings::load();

    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args, settings.flat_mask_level);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Session log (overwrites previous session log)
    relief::logger::init();

    // `Relief path/to/image.png` opens the image on the first frame
    let startup_file = std::env::args_os()
        .skip(1)
        .map(PathBuf::from)
        .find(|p| !p.to_string_lossy().starts_with('-'));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([settings.window_width, settings.window_height])
            .with_min_inner_size([320.0, 240.0])
            .with_title("3D Image Viewer"),
        ..Default::default()
    };

    eframe::run_native(
        "Relief",
        options,
        Box::new(move |cc| Box::new(ReliefApp::new(cc, settings, startup_file))),
    )
}
