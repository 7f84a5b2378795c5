mod monitor;
mod ports;
mod settings;

use crate::self_test::self_test;
use crate::settings::Settings;
use anyhow::{Context, anyhow, bail};
use chordlab_library::bindings::BindingStore;
use chordlab_library::controls::LogicalControl;
use chordlab_library::engine::{ChordEngine, EngineConfig};
use chordlab_library::lights::Lights;
use chordlab_library::params::Origin;
use chordlab_library::persistence::JsonFileStore;
use chordlab_library::router::{ControlRouter, Routed};
use chordlab_library::screen::oled_packet;
use clap::Parser;
use config::Config;
use midir::os::unix::VirtualOutput;
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(
    name = "ChordLab MiniLab 3 driver",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
)]
struct Args {
    #[clap(short, long, help = "Config file (TOML)")]
    config: Option<String>,

    #[clap(short, long, help = "List MIDI ports and exit")]
    list: bool,

    #[clap(short, long, help = "Print controller traffic until interrupted")]
    monitor: bool,

    #[clap(long, requires = "monitor", help = "Monitor as hex instead of decoded messages")]
    raw: bool,

    #[clap(short, long, help = "Show \"line1|line2\" on the OLED and exit")]
    text: Option<String>,

    #[clap(long, help = "Arm learn for a control at startup (pad:0, slider:spread, encoder:86)")]
    learn: Option<LogicalControl>,

    #[clap(long, help = "Restore the factory bindings and exit")]
    reset_bindings: bool,
}

fn load_settings(path: Option<&str>) -> anyhow::Result<Settings> {
    let mut cfg = Config::builder();

    if let Some(config_fn) = path {
        cfg = cfg.add_source(config::File::with_name(config_fn));
    }
    cfg = cfg.add_source(config::Environment::with_prefix("CHORDLAB").try_parsing(true));

    let cfg = cfg.build().context("Can't create settings")?;
    let settings: Settings = cfg.try_deserialize().context("Can't parse settings")?;
    settings.validate().map_err(|e| anyhow!("Invalid settings: {e}"))?;
    Ok(settings)
}

fn open_store(settings: &Settings) -> JsonFileStore {
    if settings.bindings_dir.is_empty() {
        JsonFileStore::in_user_config_dir()
    } else {
        JsonFileStore::new(&settings.bindings_dir)
    }
}

fn list_ports(settings: &Settings) -> anyhow::Result<()> {
    let input = MidiInput::new(&format!("{} In", settings.client_name))?;
    println!("Inputs:");
    for port in input.ports() {
        println!("  {}", input.port_name(&port).unwrap_or_default());
    }

    let output = MidiOutput::new(&settings.client_name)?;
    println!("Outputs:");
    for port in output.ports() {
        println!("  {}", output.port_name(&port).unwrap_or_default());
    }
    Ok(())
}

/// Connects to the first output port matching `wanted` (or `hints`), if any.
fn connect_output(
    client_name: &str,
    wanted: &str,
    hints: &[&str],
) -> anyhow::Result<Option<MidiOutputConnection>> {
    let output = MidiOutput::new(client_name)?;
    let available = output.ports();
    let names: Vec<String> = available
        .iter()
        .map(|p| output.port_name(p).unwrap_or_default())
        .collect();
    let Some(idx) = ports::pick(&names, wanted, hints) else {
        return Ok(None);
    };
    let name = names[idx].clone();
    let connection = output
        .connect(&available[idx], client_name)
        .map_err(|e| anyhow!("Couldn't connect to output {name:?}: {e}"))?;
    info!(port = %name, "Connected output");
    Ok(Some(connection))
}

fn connect_feedback(settings: &Settings) -> anyhow::Result<Option<MidiOutputConnection>> {
    let connection = connect_output(
        &format!("{} Feedback", settings.client_name),
        &settings.feedback_port,
        &ports::CONTROLLER_HINTS,
    )?;
    if connection.is_none() {
        warn!("No controller output found; running without OLED/pad feedback");
    }
    Ok(connection)
}

fn connect_chord_output(settings: &Settings) -> anyhow::Result<MidiOutputConnection> {
    if let Some(connection) = connect_output(
        &format!("{} Chords", settings.client_name),
        &settings.output_port,
        &ports::LOOPBACK_HINTS,
    )? {
        return Ok(connection);
    }
    if !settings.output_port.is_empty() {
        bail!("No output port matches {:?}", settings.output_port);
    }

    let output = MidiOutput::new(&settings.client_name)?;
    let connection = output
        .create_virtual(&settings.output_port_name)
        .map_err(|e| anyhow!("Couldn't create virtual output port: {e}"))?;
    info!(port = %settings.output_port_name, "Created virtual output");
    Ok(connection)
}

/// Forwards every frame from the controller into `tx` in arrival order.
fn connect_input(
    settings: &Settings,
    tx: crossbeam_channel::Sender<(u64, Vec<u8>)>,
) -> anyhow::Result<MidiInputConnection<()>> {
    let input = MidiInput::new(&format!("{} In", settings.client_name))?;
    let available = input.ports();
    let names: Vec<String> = available
        .iter()
        .map(|p| input.port_name(p).unwrap_or_default())
        .collect();
    let Some(idx) = ports::pick(&names, &settings.input_port, &ports::CONTROLLER_HINTS) else {
        bail!("No controller input found (available: {names:?})");
    };
    let name = names[idx].clone();
    let connection = input
        .connect(
            &available[idx],
            &settings.client_name,
            move |timestamp, message, _| {
                let _ = tx.send((timestamp, message.to_vec()));
            },
            (),
        )
        .map_err(|e| anyhow!("Couldn't connect to input {name:?}: {e}"))?;
    info!(port = %name, "Connected input");
    Ok(connection)
}

fn send_all<F: AsRef<[u8]>>(port: &mut MidiOutputConnection, frames: impl IntoIterator<Item = F>) {
    for frame in frames {
        if let Err(e) = port.send(frame.as_ref()) {
            warn!("MIDI send failed: {e}");
        }
    }
}

fn send_feedback(port: &mut Option<MidiOutputConnection>, frames: Vec<Vec<u8>>) {
    if let Some(port) = port {
        send_all(port, frames);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let settings = load_settings(args.config.as_deref())?;
    debug!(?settings, "Running with settings");

    if args.list {
        return list_ports(&settings);
    }

    if args.monitor {
        let (tx, rx) = crossbeam_channel::unbounded();
        let _input_connection = connect_input(&settings, tx)?;
        monitor::monitor(rx, args.raw);
        return Ok(());
    }

    let store = open_store(&settings);
    info!(path = %store.path().display(), "Bindings file");

    if args.reset_bindings {
        let mut bindings = BindingStore::load(Box::new(store));
        bindings.reset_binding(None);
        if let Some(fault) = bindings.persistence_fault() {
            bail!("Could not save bindings: {fault}");
        }
        info!("Bindings restored to factory defaults");
        return Ok(());
    }

    let mut feedback = connect_feedback(&settings)?;

    // If --text is provided, just display the text and exit
    if let Some(text) = args.text {
        let (line1, line2) = text.split_once('|').unwrap_or((text.as_str(), ""));
        let Some(port) = feedback.as_mut() else {
            bail!("No controller output to show text on");
        };
        port.send(&oled_packet(line1, line2))?;
        return Ok(());
    }

    let mut chords = connect_chord_output(&settings)?;
    let (tx, rx) = crossbeam_channel::unbounded();
    let _input_connection = connect_input(&settings, tx)?;

    if settings.self_test {
        if let Some(port) = feedback.as_mut() {
            self_test(port, &mut Lights::new(settings.pad_led_base))?;
        }
    }

    let router = ControlRouter::new(BindingStore::load(Box::new(store)), settings.pad_led_base);
    let mut engine = ChordEngine::new(
        router,
        EngineConfig {
            velocity: settings.velocity,
            channel: settings.channel,
            latch: settings.latch,
        },
    );
    let changes = engine.router_mut().subscribe();

    let frames = engine.router_mut().refresh();
    send_feedback(&mut feedback, frames);

    for (key, value) in settings.initial_params() {
        let output = engine.router_mut().set_parameter(key, value, Origin::User);
        send_feedback(&mut feedback, output.feedback);
    }

    if let Some(control) = args.learn {
        engine.router_mut().arm_learn(control);
        if let Some(frame) = engine.router_mut().show_text("Learn", &control.to_string()) {
            send_feedback(&mut feedback, vec![frame]);
        }
    }

    info!("Ready");
    for (timestamp, frame) in rx.iter() {
        let output = engine.process_frame(&frame, timestamp);
        send_all(&mut chords, output.notes);
        send_feedback(&mut feedback, output.feedback);

        match output.routed {
            Some(Routed::Learned { control, binding }) => info!(%control, ?binding, "Learn complete"),
            Some(Routed::Unmatched(event)) => debug!(?event, "Unbound event"),
            _ => {}
        }
        for change in changes.try_iter() {
            info!(?change, "Bindings changed");
        }
    }

    send_all(&mut chords, engine.all_notes_off());
    Ok(())
}
