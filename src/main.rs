//! updi - A host-side programmer for single-wire UPDI-class microcontrollers
//!
//! Drives the proprietary single-wire programming protocol end to end:
//! identity read, unlock/enter-NVM, erase, flash/EEPROM/user-row/fuse/SRAM
//! access, and the information-block write/verify pair that records
//! firmware version, size, and a CRC-24 of its contents.

mod addrlist;
mod backend;
mod catalog;
mod cli;
mod commands;
mod error;
mod hexfile;

use clap::Parser;
use updi_core::chip::{DeviceCatalog, DeviceDescriptor, RegionKind};
use updi_core::nvm::Nvm;
use updi_core::operation;
use updi_core::transport::Transport;

use cli::{Cli, Command, SessionArgs};
use error::CliError;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.session.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(error::exit_code(&e));
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let catalog = catalog::load(cli.session.device_catalog.as_deref())?;
    log::info!("loaded {} device(s) from catalog", catalog.len());

    match cli.command {
        Some(Command::ListDevices) => {
            commands::list::list_devices(&catalog);
            Ok(())
        }
        None => run_session(&cli.session, &catalog),
    }
}

fn run_session(args: &SessionArgs, catalog: &DeviceCatalog) -> Result<(), CliError> {
    let device_name = args
        .device
        .as_deref()
        .ok_or_else(|| CliError::InvalidArgument("--device is required".into()))?;
    let device: DeviceDescriptor = catalog
        .find_by_name(device_name)
        .cloned()
        .ok_or_else(|| CliError::InvalidArgument(format!("unknown device '{device_name}'")))?;

    let comport = args
        .comport
        .as_deref()
        .ok_or_else(|| CliError::InvalidArgument("--comport is required".into()))?;

    let transport = backend::open(comport, args.baudrate, device.clone())?;
    let mut nvm = operation::connect(transport, args.baudrate, 0, device)?;

    let flash_start = nvm.get_region(RegionKind::Flash).start;
    let segments = match &args.file {
        Some(path) => Some(hexfile::load_image(path, flash_start).map_err(CliError::Image)?),
        None => None,
    };

    with_cleanup(&mut nvm, |nvm| {
        if args.unlock {
            operation::unlock(nvm)?;
            println!("Device unlocked");
        }

        if args.program {
            let segments = segments
                .as_ref()
                .ok_or_else(|| CliError::InvalidArgument("--program requires --file".into()))?;
            commands::program::run_program(nvm, segments)?;
        } else if args.erase {
            commands::erase::run_erase(nvm)?;
        }

        if args.check {
            let segments = segments
                .as_ref()
                .ok_or_else(|| CliError::InvalidArgument("--check requires --file".into()))?;
            commands::check::run_check(nvm, segments)?;
        }

        if let Some(spec) = &args.fuses {
            let pairs = addrlist::parse_fuse_list(spec).map_err(CliError::InvalidArgument)?;
            commands::fuses::run_fuses(nvm, &pairs)?;
        }

        if let Some(spec) = &args.read {
            let specs = addrlist::parse_read_list(spec).map_err(CliError::InvalidArgument)?;
            commands::memio::run_read(nvm, &specs)?;
        }

        if let Some(spec) = &args.write {
            let specs = addrlist::parse_write_list(spec).map_err(CliError::InvalidArgument)?;
            commands::memio::run_write(nvm, &specs)?;
        }

        if args.update {
            let segments = segments
                .as_ref()
                .ok_or_else(|| CliError::InvalidArgument("--update requires --file".into()))?;
            commands::update::run_update(nvm, segments)?;
        }

        if let Some(path) = &args.save {
            commands::save::run_save(nvm, path)?;
        }

        if args.reset {
            commands::reset::run_reset(nvm)?;
        }

        if args.info {
            commands::info::run_info(nvm)?;
        }

        Ok(())
    })
}

/// Run `f` against `nvm`, then always attempt `leave_progmode` as a cleanup
/// step regardless of whether `f` succeeded, mirroring
/// `updi_core::operation::run_session`'s discipline at the CLI's own
/// [`CliError`] boundary (the core helper's `Result` is pinned to
/// `updi_core::error::Error`, not this crate's richer error type).
fn with_cleanup<T, F>(nvm: &mut Nvm<T>, f: F) -> Result<(), CliError>
where
    T: Transport,
    F: FnOnce(&mut Nvm<T>) -> Result<(), CliError>,
{
    let result = f(nvm);
    let _ = nvm.leave_progmode();
    result
}
