use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use linux_embedded_hal::{
    gpio_cdev::{Chip, LineRequestFlags},
    spidev::{SpiModeFlags, SpidevOptions},
    CdevPin, Delay, SpidevBus,
};
use simplelog::{ColorChoice, LevelFilter, TermLogger, TerminalMode};

use mainichi_shashin::artifact::ArtifactStore;
use mainichi_shashin::catalog::JsonCatalog;
use mainichi_shashin::config::{Config, DEFAULT_CONFIG_PATH};
use mainichi_shashin::it8951::{DisplayInterface, It8951};
use mainichi_shashin::pipeline;
use mainichi_shashin::slideshow::Slideshow;

type HardwarePanel = It8951<SpidevBus, CdevPin, CdevPin, CdevPin, CdevPin, Delay>;

#[derive(Parser)]
#[command(name = "mainichi-shashin")]
#[command(version, about = "Show a different photo every day on an IT8951 e-paper panel")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the slideshow until interrupted
    Run,
    /// Convert a photo into a panel-ready artifact
    Prepare {
        /// Source photo (PNG, JPEG, BMP, GIF or WebP)
        input: PathBuf,
        /// Artifact to write, relative paths land in the artifact directory
        output: PathBuf,
        /// Also add the artifact to the catalog
        #[arg(long)]
        register: bool,
        /// Catalog name, defaults to the input file name
        #[arg(long, requires = "register")]
        name: Option<String>,
    },
    /// Wipe the panel to white and put it to sleep
    Clear,
    /// Print what the controller reports about itself
    Info,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    TermLogger::init(
        cli.log_level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("installing logger")?;

    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Run => run(&config),
        Command::Prepare {
            input,
            output,
            register,
            name,
        } => prepare(&config, &input, &output, register, name),
        Command::Clear => clear(&config),
        Command::Info => info(&config),
    }
}

/// The default path may be absent on a development machine, an explicit one may not.
fn load_config(path: &Path) -> anyhow::Result<Config> {
    if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
        log::warn!("{} not found, using built-in defaults", DEFAULT_CONFIG_PATH);
        return Ok(Config::default());
    }
    Config::load(path).context("loading configuration")
}

fn output_pin(chip: &mut Chip, offset: u32, initial: u8, consumer: &str) -> anyhow::Result<CdevPin> {
    let handle = chip
        .get_line(offset)
        .with_context(|| format!("getting GPIO line {}", offset))?
        .request(LineRequestFlags::OUTPUT, initial, consumer)
        .with_context(|| format!("requesting GPIO line {} as {}", offset, consumer))?;
    CdevPin::new(handle).with_context(|| format!("creating {} pin", consumer))
}

fn open_panel(config: &Config) -> anyhow::Result<HardwarePanel> {
    log::info!("Opening SPI device {}", config.bus.device.display());
    let mut spi = SpidevBus::open(&config.bus.device)
        .with_context(|| format!("opening SPI device {}", config.bus.device.display()))?;

    // Chip select is driven as a GPIO line, the controller needs it held across a transaction
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(config.bus.speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0 | SpiModeFlags::SPI_NO_CS)
        .build();
    spi.configure(&options).context("configuring SPI")?;

    let mut chip = Chip::new(&config.bus.gpio_chip)
        .with_context(|| format!("opening GPIO chip {}", config.bus.gpio_chip.display()))?;
    let rst = output_pin(&mut chip, config.pins.reset, 1, "mainichi-rst")?;
    let dc = output_pin(&mut chip, config.pins.data_command, 0, "mainichi-dc")?;
    let cs = output_pin(&mut chip, config.pins.chip_select, 1, "mainichi-cs")?;

    let busy_handle = chip
        .get_line(config.pins.busy)
        .context("getting HRDY line")?
        .request(LineRequestFlags::INPUT, 0, "mainichi-hrdy")
        .context("requesting HRDY line")?;
    let busy = CdevPin::new(busy_handle).context("creating HRDY pin")?;

    let interface =
        DisplayInterface::new(spi, busy, dc, rst, cs, Delay).with_busy_wait(config.busy_wait());
    Ok(It8951::new(interface, config.command_table()?).with_chunk_size(config.bus.chunk_size))
}

fn run(config: &Config) -> anyhow::Result<()> {
    let panel = open_panel(config)?;
    let catalog = JsonCatalog::open(&config.slideshow.catalog);
    let store = ArtifactStore::new(&config.slideshow.artifacts, config.geometry());

    let slideshow = Slideshow::new(panel, catalog, store, config.vcom(), config.timing());
    let handle = slideshow.start().context("starting slideshow")?;

    let stop = handle.stop_signal();
    ctrlc::set_handler(move || {
        log::info!("Stop requested");
        stop.stop();
    })
    .context("installing signal handler")?;

    handle.wait();
    log::info!("Slideshow stopped");
    Ok(())
}

fn prepare(
    config: &Config,
    input: &Path,
    output: &Path,
    register: bool,
    name: Option<String>,
) -> anyhow::Result<()> {
    let geometry = config.geometry();
    let frame = pipeline::prepare_file(input, geometry)
        .with_context(|| format!("preparing {}", input.display()))?;
    let store = ArtifactStore::new(&config.slideshow.artifacts, geometry);
    let written = store.save(output, &frame).context("saving artifact")?;
    println!("{}", written.display());

    if register {
        let name = name.unwrap_or_else(|| {
            input
                .file_stem()
                .map_or_else(|| input.display().to_string(), |s| s.to_string_lossy().into_owned())
        });
        let catalog = JsonCatalog::open(&config.slideshow.catalog);
        let photo = catalog
            .add_photo(&name, output)
            .with_context(|| format!("registering in {}", catalog.path().display()))?;
        println!("registered as photo {}", photo.id);
    }
    Ok(())
}

fn clear(config: &Config) -> anyhow::Result<()> {
    let mut panel = open_panel(config)?;
    let result = panel
        .initialize(config.geometry(), config.vcom())
        .and_then(|()| panel.clear());
    panel.shutdown();
    result.context("clearing panel")
}

fn info(config: &Config) -> anyhow::Result<()> {
    let mut panel = open_panel(config)?;
    let result = panel
        .initialize(config.geometry(), config.vcom())
        .and_then(|()| panel.vcom());
    let report = match (result, panel.device_info()) {
        (Ok(vcom), Some(info)) => Ok(format!(
            "panel:        {}x{}\nfirmware:     {}\nlut:          {}\nimage buffer: 0x{:08X}\nvcom:         {}",
            info.width, info.height, info.firmware, info.lut, info.image_buffer_addr, vcom
        )),
        (Ok(_), None) => Err(anyhow::anyhow!("controller returned no device info")),
        (Err(e), _) => Err(e.into()),
    };
    panel.shutdown();
    println!("{}", report.context("reading device info")?);
    Ok(())
}
