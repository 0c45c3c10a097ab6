/// Interactive console for driving the floppy controller by hand

use dez80::Instruction;

use d88fdc::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "D88FDC_LOG";

/// Command completer for the REPL
struct CommandCompleter {
    commands: Vec<&'static str>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                "cmd",
                "create",
                "dasm",
                "disassemble",
                "drives",
                "eject",
                "exit",
                "help",
                "info",
                "mount",
                "protect",
                "quit",
                "read-sector",
                "sectors",
                "status",
                "tc",
                "tracks",
            ],
        }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Only complete the first word (command name)
        let line_to_cursor = &line[..pos];
        if line_to_cursor.contains(' ') {
            return Ok((pos, vec![]));
        }

        let prefix = line_to_cursor.to_lowercase();
        let matches: Vec<Pair> = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(&prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}
impl Validator for CommandCompleter {}
impl Helper for CommandCompleter {}

/// Get the path to the history file
fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".d88fdc_history");
        p
    })
}

fn init_tracing() {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) => EnvFilter::default().add_directive(LevelFilter::INFO.into()),
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn main() {
    init_tracing();

    println!("=== D88 FDC console ===");
    println!("Drive a μPD765 controller over D88 disk images.");
    println!("Type 'help' for available commands\n");

    let config = match std::env::args().nth(1) {
        Some(path) => FdcConfig::load_from_path(path),
        None => FdcConfig::load(),
    };
    let mut fdc = Fdc::new(DriveSet::from_config(&config));
    fdc.set_trace_ports(config.trace_ports);
    let irq = fdc.irq_line();

    let mut rl = match Editor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to create editor: {}", e);
            return;
        }
    };
    rl.set_helper(Some(CommandCompleter::new()));

    if let Some(history_path) = history_path() {
        let _ = rl.load_history(&history_path);
    }

    loop {
        let readline = rl.readline("> ");
        let input = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let _ = rl.add_history_entry(input);

        let parts = parse_command_line(input);
        if parts.is_empty() {
            continue;
        }
        let command = parts[0].to_lowercase();

        match command.as_str() {
            "help" => {
                print_help();
            }
            "quit" | "exit" => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                fdc.drives_mut().eject();
                println!("Goodbye!");
                break;
            }
            "mount" => {
                if parts.len() < 3 {
                    println!("Usage: mount <drive> <path>");
                    continue;
                }
                let Some(index) = parse_drive(&parts[1]) else {
                    continue;
                };
                let request = DriveRequest::Open {
                    index,
                    path: parts[2].clone().into(),
                };
                match fdc.drives_mut().apply(request) {
                    Ok(()) => println!("Mounted {} in drive {}", parts[2], index),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "eject" => {
                let request = match parts.get(1) {
                    Some(arg) => match parse_drive(arg) {
                        Some(index) => DriveRequest::Close { index },
                        None => continue,
                    },
                    None => DriveRequest::EjectAll,
                };
                if let Err(e) = fdc.drives_mut().apply(request) {
                    println!("Error: {}", e);
                }
            }
            "drives" => {
                list_drives(fdc.drives());
            }
            "create" => {
                if parts.len() < 2 {
                    println!("Usage: create <path> [cylinders] [sectors] [n]");
                    continue;
                }
                let mut builder = D88ImageBuilder::new().name("BLANK");
                if let Some(cylinders) = parts.get(2).and_then(|s| parse_hex_or_dec(s)) {
                    builder = builder.cylinders(cylinders);
                }
                if let Some(sectors) = parts.get(3).and_then(|s| parse_hex_or_dec(s)) {
                    builder = builder.sectors_per_track(sectors);
                }
                if let Some(size_code) = parts.get(4).and_then(|s| parse_hex_or_dec(s)) {
                    builder = builder.size_code(size_code);
                }
                match builder.build(&parts[1]) {
                    Ok(()) => println!("Created {}", parts[1]),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "protect" => {
                if parts.len() < 2 {
                    println!("Usage: protect <path> [on|off]");
                    continue;
                }
                let protect = match parts.get(2).map(|s| s.to_lowercase()).as_deref() {
                    Some("on") => true,
                    Some("off") => false,
                    Some(other) => {
                        println!("Expected 'on' or 'off', got '{}'", other);
                        continue;
                    }
                    None => match read_write_protect(&parts[1]) {
                        Ok(current) => !current,
                        Err(e) => {
                            println!("Error: {}", e);
                            continue;
                        }
                    },
                };
                match fdc.drives().set_write_protect(&parts[1], protect) {
                    Ok(()) => println!(
                        "{} is now {}",
                        parts[1],
                        if protect { "write-protected" } else { "writable" }
                    ),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "info" => {
                let index = parts.get(1).and_then(|s| parse_drive(s)).unwrap_or(0);
                match fdc.drives().get(index).map(Drive::image) {
                    Ok(Some(image)) => print_info(image),
                    Ok(None) => println!("No disk in drive {}", index),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "tracks" => {
                let index = parts.get(1).and_then(|s| parse_drive(s)).unwrap_or(0);
                match fdc.drives().get(index).map(Drive::image) {
                    Ok(Some(image)) => list_tracks(image),
                    Ok(None) => println!("No disk in drive {}", index),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "sectors" => {
                if parts.len() < 4 {
                    println!("Usage: sectors <drive> <cylinder> <head>");
                    continue;
                }
                let (Some(index), Some(cylinder), Some(head)) = (
                    parse_drive(&parts[1]),
                    parse_hex_or_dec(&parts[2]),
                    parse_hex_or_dec(&parts[3]),
                ) else {
                    println!("Invalid arguments");
                    continue;
                };
                let ids = fdc
                    .drives_mut()
                    .get_mut(index)
                    .and_then(Drive::image_mut)
                    .and_then(|image| image.sector_ids(TrackPos::new(cylinder, head)));
                match ids {
                    Ok(ids) => {
                        println!("{} sectors:", ids.len());
                        for id in ids {
                            println!("  {}  ({} bytes)", id, id.size_bytes());
                        }
                    }
                    Err(e) => println!("Error: {}", e),
                }
            }
            "read-sector" => {
                if parts.len() < 5 {
                    println!("Usage: read-sector <drive> <c> <h> <r> [n]");
                    continue;
                }
                let (Some(unit), Some(c), Some(h), Some(r)) = (
                    parse_drive(&parts[1]),
                    parse_hex_or_dec(&parts[2]),
                    parse_hex_or_dec(&parts[3]),
                    parse_hex_or_dec(&parts[4]),
                ) else {
                    println!("Invalid arguments");
                    continue;
                };
                let n = parts.get(5).and_then(|s| parse_hex_or_dec(s)).unwrap_or(1);
                let id = SectorId::new(c, h, r, n);
                let (data, result) = read_sector(&mut fdc, unit as u8, id);
                print_result(&result);
                if !data.is_empty() {
                    print_hex_dump(&data, 512);
                }
            }
            "disassemble" | "dasm" => {
                let unit = parts.get(1).and_then(|s| parse_drive(s)).unwrap_or(0) as u8;
                let (data, result) = read_sector(&mut fdc, unit, SectorId::new(0, 0, 1, 1));
                if FdcStatus0(result.first().copied().unwrap_or(0)).abnormal_termination() {
                    print_result(&result);
                } else {
                    disassemble_z80(&data);
                }
            }
            "cmd" => {
                let bytes: Option<Vec<u8>> = parts[1..].iter().map(|s| parse_hex_or_dec(s)).collect();
                let Some(bytes) = bytes.filter(|b| !b.is_empty()) else {
                    println!("Usage: cmd <byte> [byte...]");
                    continue;
                };
                for byte in bytes {
                    fdc.write_port(Port::Data.address(), byte);
                }
                report_phase(&mut fdc);
            }
            "tc" => {
                fdc.read_port(Port::MotorTerminalCount.address());
                report_phase(&mut fdc);
            }
            "status" => {
                println!("Phase: {:?}", fdc.phase());
                println!("MSR:   {}", MainStatus(fdc.read_status()));
                println!("IRQ:   {}", if irq.take() { "raised" } else { "clear" });
                println!(
                    "Mode:  {:02X}  VFO: {:02X}  Precomp: {:02X}",
                    fdc.drive_mode(),
                    fdc.vfo(),
                    fdc.precompensation()
                );
            }
            _ => {
                println!("Unknown command: {}", parts[0]);
                println!("Type 'help' for available commands");
            }
        }
    }
}

/// Parse command line input, respecting quoted strings
fn parse_command_line(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

fn print_help() {
    println!("Available commands:");
    println!("  mount <drive> <path>           - Insert a D88 image into drive 0-3");
    println!("  eject [drive]                  - Eject one drive, or all");
    println!("  drives                         - Show drive status");
    println!("  create <path> [cyl] [sec] [n]  - Write a blank 2D image (default 40 16 1)");
    println!("  protect <path> [on|off]        - Set or toggle an unmounted image's write protect");
    println!("  info [drive]                   - Show disk header");
    println!("  tracks [drive]                 - List track extents");
    println!("  sectors <drive> <c> <h>        - List sector IDs on a track");
    println!("  read-sector <d> <c> <h> <r> [n] - Seek and read a sector through the controller");
    println!("  disassemble [drive]            - Disassemble the boot sector (dasm)");
    println!("  cmd <byte> [byte...]           - Write raw bytes to the data register");
    println!("  tc                             - Pulse terminal count");
    println!("  status                         - Show phase, MSR, interrupt line and control ports");
    println!("  help                           - Show this help");
    println!("  quit, exit                     - Exit");
}

/// Current write-protect flag in the header of the image at `path`
fn read_write_protect(path: &str) -> Result<bool> {
    let mut file = std::fs::File::open(path)?;
    Ok(d88fdc::io::reader::read_header(&mut file)?.write_protect)
}

fn parse_drive(s: &str) -> Option<usize> {
    match s.parse::<usize>() {
        Ok(index) if index < DRIVE_COUNT => Some(index),
        _ => {
            println!("Drive must be 0-{}", DRIVE_COUNT - 1);
            None
        }
    }
}

fn list_drives(drives: &DriveSet) {
    for (index, drive) in drives.iter().enumerate() {
        let disk = match drive.image() {
            Some(image) => format!(
                "{}{}",
                image.path().display(),
                if image.is_write_protected() { " (WP)" } else { "" }
            ),
            None => "-".to_string(),
        };
        println!(
            "  {}: C={:<3} motor={:<3} {}",
            index,
            drive.cylinder,
            if drive.motor { "on" } else { "off" },
            disk
        );
    }
}

fn print_info(image: &D88Image) {
    let header = image.header();
    println!("Filename: {}", image.path().display());
    println!("Name: {}", header.name);
    println!("Kind: {}", header.kind);
    println!("Size: {} bytes", header.disk_size);
    println!(
        "Write protect: {}",
        if image.is_write_protected() { "Yes" } else { "No" }
    );
    let formatted = (0..image.max_track())
        .filter(|&i| image.track(i).is_some())
        .count();
    println!("Formatted tracks: {} of {}", formatted, image.max_track());
}

fn list_tracks(image: &D88Image) {
    println!("Track  Cyl Head  Offset   Length  Cached");
    for index in 0..image.max_track() {
        if let Some(track) = image.track(index) {
            println!(
                "{:5}  {:3} {:4}  {:06X}  {:6}  {}",
                index,
                index / 2,
                index % 2,
                track.offset,
                track.length,
                if track.is_loaded() { "yes" } else { "no" }
            );
        }
    }
}

/// Seek to `id.cylinder` and read one sector with Read Data, ending it with terminal count
fn read_sector(fdc: &mut Fdc, unit: u8, id: SectorId) -> (Vec<u8>, Vec<u8>) {
    let data_port = Port::Data.address();
    let head_unit = ((id.head & 0x01) << 2) | (unit & 0x03);

    for byte in [0x0F, unit & 0x03, id.cylinder] {
        fdc.write_port(data_port, byte);
    }
    fdc.write_port(data_port, 0x08);
    drain_result(fdc);

    let command = [
        0x46,
        head_unit,
        id.cylinder,
        id.head,
        id.record,
        id.size_code,
        id.record,
        0x0E,
        0xFF,
    ];
    for byte in command {
        fdc.write_port(data_port, byte);
    }

    let mut data = Vec::with_capacity(id.size_bytes());
    while fdc.phase() == Phase::Execution && data.len() < id.size_bytes() {
        data.push(fdc.read_port(data_port));
    }
    if fdc.phase() == Phase::Execution {
        fdc.read_port(Port::MotorTerminalCount.address());
    } else {
        // Ended early; the last byte read was not data
        data.clear();
    }

    (data, drain_result(fdc))
}

fn drain_result(fdc: &mut Fdc) -> Vec<u8> {
    let mut result = Vec::new();
    while fdc.phase() == Phase::Result {
        result.push(fdc.read_port(Port::Data.address()));
    }
    result
}

fn report_phase(fdc: &mut Fdc) {
    match fdc.phase() {
        Phase::Result => print_result(&drain_result(fdc)),
        phase => println!("Phase: {:?}  MSR: {}", phase, MainStatus(fdc.read_status())),
    }
}

fn print_result(result: &[u8]) {
    let bytes: Vec<String> = result.iter().map(|b| format!("{:02X}", b)).collect();
    println!("Result: {}", bytes.join(" "));
    if result.len() == 7 {
        println!("  ST0: {}", FdcStatus0(result[0]));
        println!("  ST1: {}", FdcStatus1(result[1]));
        println!("  ST2: {}", FdcStatus2(result[2]));
        println!(
            "  C={:02X} H={:02X} R={:02X} N={:02X}",
            result[3], result[4], result[5], result[6]
        );
    }
}

fn print_hex_dump(data: &[u8], max_bytes: usize) {
    let len = data.len().min(max_bytes);

    for (i, chunk) in data[..len].chunks(16).enumerate() {
        print!("{:04X}: ", i * 16);

        for (j, byte) in chunk.iter().enumerate() {
            print!("{:02X} ", byte);
            if j == 7 {
                print!(" ");
            }
        }

        for j in chunk.len()..16 {
            print!("   ");
            if j == 7 {
                print!(" ");
            }
        }

        print!(" |");
        for byte in chunk {
            let c = if (32..127).contains(byte) {
                *byte as char
            } else {
                '.'
            };
            print!("{}", c);
        }
        println!("|");
    }

    if data.len() > max_bytes {
        println!("... ({} more bytes)", data.len() - max_bytes);
    }
}

fn parse_hex_or_dec(s: &str) -> Option<u8> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Disassemble boot code, which the disk sub-processor loads at 0x0000
fn disassemble_z80(data: &[u8]) {
    let mut slice: &[u8] = data;
    let mut address: usize = 0;

    while !slice.is_empty() {
        let start_len = slice.len();

        match Instruction::decode_one(&mut slice) {
            Ok(instruction) => {
                let consumed = start_len - slice.len();
                let bytes: Vec<String> = data[address..address + consumed]
                    .iter()
                    .map(|b| format!("{:02X}", b))
                    .collect();

                println!("{:04X}  {:<12} {}", address, bytes.join(" "), instruction);
                address += consumed;
            }
            Err(_) => {
                // Truncated instruction at the end of the sector
                let byte = data[address];
                println!("{:04X}  {:02X}           DB {:02X}h", address, byte, byte);
                address += 1;
                slice = &data[address..];
            }
        }
    }
}
