#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]

use std::sync::Arc;

use clap::Parser;
use qpvk::ash;
use qpvk::{
    catalog::CapabilityCatalog,
    context::Context,
    device::{self, EnumerateDevicesError},
    instance::Instance,
    negotiate::{self, SurfacePlatform},
};
use tracing_subscriber::fmt::{
    FmtContext, FormatEvent, FormatFields, format::Writer,
};
use tracing_subscriber::registry::LookupSpan;

/// Zero physical devices: an environment condition the operator can fix.
const EXIT_NO_DEVICE: i32 = 1;
/// Broken environment: a driver call that must succeed did not.
const EXIT_FATAL: i32 = -1;

#[derive(clap::Parser, Debug)]
#[command(
    name = "qpvk",
    about = "Hello World",
    long_about = "A minimal prototype of Vulkan application"
)]
struct CliArgs {
    /// enable debugging
    #[arg(short, long)]
    verbose: bool,
    /// list available devices
    #[arg(short, long)]
    list_devices: bool,
    /// select device
    #[arg(short, long)]
    device: Option<String>,
}

/// Renders every event as `<LEVEL>: <message>`.
struct LevelPrefixFormat;

impl<S, N> FormatEvent<S, N> for LevelPrefixFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        write!(writer, "{}: ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn main() {
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .event_format(LevelPrefixFormat)
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    // run() returns before the exit call so every driver object is
    // destroyed in order; process::exit skips destructors.
    let code = run(args);
    std::process::exit(code);
}

fn run(args: CliArgs) -> i32 {
    tracing::info!("VERBOSE: {}", if args.verbose { "YES" } else { "NO" });

    //SAFETY: Loading the Vulkan shared library executes driver
    //initialization code; there is nothing to check beyond trusting the
    //local installation.
    let entry = match unsafe { ash::Entry::load() } {
        Ok(entry) => entry,
        Err(e) => {
            tracing::error!("Loading Vulkan failed: {}", e);
            return EXIT_FATAL;
        }
    };

    let catalog = match CapabilityCatalog::query(&entry) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("{}", e);
            return EXIT_FATAL;
        }
    };

    let capabilities =
        negotiate::negotiate(&catalog, args.verbose, SurfacePlatform::current());

    let app_name =
        std::env::args().next().unwrap_or_else(|| "qpvk".to_owned());
    let instance = match Instance::new(
        entry,
        &app_name,
        ash::vk::API_VERSION_1_1,
        capabilities,
    ) {
        Ok(instance) => Arc::new(instance),
        Err(e) => {
            tracing::error!("{}", e);
            return EXIT_FATAL;
        }
    };

    let mut descriptors = match device::enumerate_physical_devices(&instance) {
        Ok(descriptors) => descriptors,
        Err(e @ EnumerateDevicesError::NoDevicesFound) => {
            tracing::error!("{}", e);
            return EXIT_NO_DEVICE;
        }
        Err(e) => {
            tracing::error!("{}", e);
            return EXIT_FATAL;
        }
    };

    if args.list_devices {
        print!("Available physical devices: ");
        println!("Count = {}", descriptors.len());
        for (index, descriptor) in descriptors.iter().enumerate() {
            println!("Device {}:", index);
            println!("    Name: {}", descriptor.name());
            println!("    ID: {}", descriptor.id_hex());
        }
        return 0;
    }

    let selected =
        device::select_device(&descriptors, args.device.as_deref());
    tracing::info!("Selected device: {}", descriptors[selected].name());

    let descriptor = descriptors.swap_remove(selected);
    let context = Context::new(Arc::clone(&instance), descriptor);
    drop(context);

    0
}
