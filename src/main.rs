use clap::Parser;
use crossbeam::channel::unbounded;
use djlink2midi::{
    cli::{format_device_list, select_device, validate_device, Args},
    feed::{open_feed, spawn_feed},
    handle_device_list, logging,
    midi::DefaultMidiEngine,
    ui::StatusDisplay,
    EventLoop, Settings,
};

fn main() {
    let args = parse_command_line_arguments();
    let settings = load_settings(&args);
    initialize_logging(&settings);

    let devices = get_available_devices();

    if args.list_devices {
        list_available_devices(&devices);
        return;
    }

    let device_name = resolve_output_device(&settings, &devices);
    run_engine(&settings, &device_name);
}

fn parse_command_line_arguments() -> Args {
    Args::parse()
}

fn load_settings(args: &Args) -> Settings {
    match Settings::load(args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

fn initialize_logging(settings: &Settings) {
    let level = settings
        .log_level_filter()
        .unwrap_or(log::LevelFilter::Info);
    if let Err(e) = logging::init_logger(level) {
        eprintln!("Logger initialization failed: {}", e);
    }
    log::info!("Application starting");
}

fn get_available_devices() -> Vec<String> {
    handle_device_list()
}

fn list_available_devices(devices: &[String]) {
    println!("Available MIDI output devices:");
    for device in devices {
        println!("  - {}", device);
    }
}

fn resolve_output_device(settings: &Settings, devices: &[String]) -> String {
    match &settings.midi {
        Some(device_name) => {
            if let Err(error_msg) = validate_device(device_name, devices) {
                log::error!("{}", error_msg);
                eprintln!("{}", error_msg);
                std::process::exit(1);
            }
            device_name.clone()
        }
        None => match select_device(devices) {
            Some(device_name) => device_name,
            None => {
                eprintln!("{}", format_device_list(devices));
                std::process::exit(1);
            }
        },
    }
}

fn run_engine(settings: &Settings, device_name: &str) {
    let engine = match DefaultMidiEngine::new(device_name) {
        Ok(engine) => engine,
        Err(e) => {
            let error_msg = format!("Error connecting to MIDI device: {}", e);
            log::error!("{}", error_msg);
            eprintln!("{}", error_msg);
            std::process::exit(1);
        }
    };

    let feed = match open_feed(&settings.feed) {
        Ok(feed) => feed,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    log::info!("Program started");
    log::info!("Using status feed:       {}", settings.feed);
    log::info!("Using MIDI interface:    {}", engine.port_name());

    let (message_tx, message_rx) = unbounded();
    let feed_handle = spawn_feed(feed, message_tx);

    let mut event_loop = EventLoop::new(settings, engine, message_rx);
    if settings.display {
        event_loop = event_loop.with_display(StatusDisplay::new());
    }

    let summary = event_loop.run();
    log::info!(
        "Engine finished after {} status reports and {} clock pulses",
        summary.reports,
        summary.pulses
    );

    if feed_handle.join().is_err() {
        log::error!("Status feed thread panicked");
    }
}
