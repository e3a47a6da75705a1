//! Boardlink command line interface.

use std::{
    fs,
    io::{self, BufRead, Write},
    process,
    sync::mpsc::{self, Sender},
    thread,
};

use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_t, App, AppSettings::*, Arg,
};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, trace, LevelFilter};
use serialport::{DataBits, FlowControl, Parity, StopBits};
use simplelog::*;

use boardlink::{
    self as bl,
    sinks::{LogSink, StatusBoard, ACTIVE_STATION},
    transport, Link, LinkEvent,
};

/// Asks the board to load its default recipe.
const DEFAULT_RECIPE_REQUEST: &[u8] = b"$R\n";

fn main() {
    println!("[BL] boardlink v{}", crate_version!());

    let matches = App::new(crate_name!())
        .version(format!("v{}", crate_version!()).as_str())
        .author(crate_authors!())
        .about(crate_description!())
        .long_about(
            "\n\
            Boardlink connects to the controller board over a serial line and \
            works as a simple console: every line typed on stdin is queued and \
            sent to the board, status updates and log lines coming back from \
            the board are printed on stdout.\n\
            \n\
            Lines are sent one at a time; the next one only goes out after the \
            board answered `ok`. Lines starting with `#`, `%` or `$` open a raw \
            block which runs until the same character appears again; blocks are \
            streamed in 64 byte chunks without waiting for `ok`.\n\
            \n\
            Local commands:\n\
               \t* `!recipe` asks the board for its default recipe\n\
               \t* `!quit` closes the link and exits\n\
            \n\
            When no device is given, the first USB serial device with the \
            board's vendor id is used.\
        ",
        )
        .max_term_width(80)
        .setting(ColoredHelp)
        .setting(NextLineHelp)
        .arg(
            Arg::with_name("DEVICE_TTY")
                .help("the tty device of the board")
                .long_help(
                    "the tty device of the board; when not set, the first USB \
                     serial device with the board's vendor id is used.",
                )
                .short("t")
                .long("tty")
                .takes_value(true)
                .require_equals(true)
                .conflicts_with("TCP"),
        )
        .arg(
            Arg::with_name("TCP")
                .help("reach the board through a TCP serial bridge (HOST:PORT)")
                .long("tcp")
                .takes_value(true)
                .require_equals(true),
        )
        .arg(
            Arg::with_name("SELECT")
                .help("interactively select the serial device")
                .long("select")
                .conflicts_with_all(&["DEVICE_TTY", "TCP"]),
        )
        .arg(
            Arg::with_name("VENDOR_ID")
                .help("USB vendor id of the board, used when no device is given")
                .long("vendor-id")
                .takes_value(true)
                .default_value("1155")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("BAUD_RATE")
                .help("serial port baud rate")
                .short("b")
                .long("baud-rate")
                .takes_value(true)
                .default_value("115200")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("DATA_BITS")
                .help("number of bits per character")
                .short("d")
                .long("data-bits")
                .takes_value(true)
                .possible_values(&["5", "6", "7", "8"])
                .default_value("8")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("STOP_BITS")
                .help("number of stop bits per byte")
                .short("s")
                .long("stop-bits")
                .takes_value(true)
                .possible_values(&["1", "2"])
                .default_value("1")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("PARITY")
                .help("parity checking protocol")
                .short("p")
                .long("parity")
                .takes_value(true)
                .possible_values(&["none", "odd", "even"])
                .default_value("none")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("FLOW_CONTROL")
                .help("flow control mode")
                .short("f")
                .long("flow-control")
                .takes_value(true)
                .possible_values(&["none", "soft", "hard"])
                .default_value("none")
                .require_equals(true),
        )
        .arg(
            Arg::with_name("WATCH")
                .help("status key to print when the board updates it")
                .long_help(
                    "status key to print when the board updates it; may be \
                     repeated. The active station (`ativa`) is always shown.",
                )
                .short("w")
                .long("watch")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .require_equals(true),
        )
        .arg(
            Arg::with_name("FILE")
                .help("G-code file to stream to the board after connecting")
                .index(1),
        )
        .arg(Arg::with_name("v").short("v").multiple(true).help(
            "Sets the logging level of verbosity, repeat several times for \
                higher verbosity",
        ))
        .get_matches();

    // Vary the output based on how many times the user used the "verbose" flag
    // (i.e. 'boardlink -v -v -v' or 'boardlink -vvv' vs 'boardlink -v'
    let log_level = match matches.occurrences_of("v") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    if let Err(e) = TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        println!("{}: could not set up logging: {}", style("warning").yellow(), e);
    }

    trace!("{:#?}", matches);

    // Arguments with default values ===========================================

    // It's safe to call unwrap on all command line arguments with default
    // values, because the value with either be what the user input at runtime
    // or the default value

    let baud_rate = value_t!(matches.value_of("BAUD_RATE"), u32)
        .unwrap_or_else(|_| bad_value("baud-rate", matches.value_of("BAUD_RATE")));

    let vendor_id = value_t!(matches.value_of("VENDOR_ID"), u16)
        .unwrap_or_else(|_| bad_value("vendor-id", matches.value_of("VENDOR_ID")));

    let data_bits = match matches.value_of("DATA_BITS").unwrap() {
        "5" => DataBits::Five,
        "6" => DataBits::Six,
        "7" => DataBits::Seven,
        "8" => DataBits::Eight,
        _ => unreachable!(),
    };

    let stop_bits = match matches.value_of("STOP_BITS").unwrap() {
        "1" => StopBits::One,
        "2" => StopBits::Two,
        _ => unreachable!(),
    };

    let parity = match matches.value_of("PARITY").unwrap() {
        "none" => Parity::None,
        "even" => Parity::Even,
        "odd" => Parity::Odd,
        _ => unreachable!(),
    };

    let flow_control = match matches.value_of("FLOW_CONTROL").unwrap() {
        "none" => FlowControl::None,
        "soft" => FlowControl::Software,
        "hard" => FlowControl::Hardware,
        _ => unreachable!(),
    };

    // END - Arguments with default values =====================================

    let mut builder = bl::SettingsBuilder::default()
        .baud_rate(baud_rate)
        .vendor_id(vendor_id)
        .data_bits(data_bits)
        .stop_bits(stop_bits)
        .parity(parity)
        .flow_control(flow_control)
        .watch(ACTIVE_STATION);

    // START - Arguments with NO default values ================================

    if let Some(path) = matches.value_of("DEVICE_TTY") {
        builder = builder.path(path);
    }

    if let Some(address) = matches.value_of("TCP") {
        builder = builder.pipe(address);
    }

    if let Some(keys) = matches.values_of("WATCH") {
        for key in keys {
            builder = builder.watch(key);
        }
    }

    if matches.is_present("SELECT") {
        match transport::select_port() {
            Some(path) => builder = builder.path(path),
            None => {
                println!("{}", style("[BL] ❌ No port selected").red());
                process::exit(1);
            }
        }
    }

    // END - Arguments =========================================================

    let settings = builder.finalize();
    debug!("{:#?}", settings);

    let (tx, rx) = mpsc::channel();

    let ctrlc_tx = tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("🛑 received Ctrl+C!");
        let _ = ctrlc_tx.send(LinkEvent::Shutdown);
    }) {
        println!("{}: no Ctrl+C handler: {}", style("warning").yellow(), e);
    }

    let mut status = StatusBoard::with_keys(settings.watched_keys.iter().cloned());
    status.on_update(|name, value| {
        if name == ACTIVE_STATION {
            println!("[BL] 🏭 Active station = {}", style(value).green());
        } else {
            println!("[BL] {} = {}", style(name).cyan(), value);
        }
    });
    let mut link = Link::new(status, ConsoleLog);

    // Opening failures are not fatal: the user can plug the board and retry.
    loop {
        match transport::open(&settings, tx.clone()) {
            Ok(opened) => {
                println!(
                    "[BL] 👍 Connected to {}",
                    style(opened.name()).green()
                );
                link.attach(opened);
                break;
            }
            Err(e) => {
                println!("{}", style(format!("[BL] 💥 {}", e)).red());
                if !ask_retry() {
                    process::exit(1);
                }
            }
        }
    }

    let progress = matches.value_of("FILE").and_then(|path| stream_file(&mut link, path));

    spawn_input(tx);

    let mut file_sent = false;
    let exit_code = link.run(&rx, |link| {
        if let Some(file) = &progress {
            if file_sent {
                return;
            }
            let engine = link.engine();
            // The file went in first: until it completes, it is the buffer
            // in flight and later submissions wait behind it.
            if engine.stats().buffers_completed > file.completed_before {
                file.bar.set_position(file.total);
                file.bar.finish_with_message("[BL] File sent");
                file_sent = true;
            } else if engine.has_pending() {
                let left = engine.pending_len() as u64;
                file.bar.set_position(file.total.saturating_sub(left));
            }
        }
    });
    debug!("exit code: {}", exit_code);
    process::exit(exit_code.into());
}

/// Prints the board's log lines as they come.
struct ConsoleLog;

impl LogSink for ConsoleLog {
    fn append(&mut self, text: &[u8]) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let _ = out.write_all(text).and_then(|_| out.write_all(b"\n"));
    }
}

fn bad_value(name: &str, value: Option<&str>) -> ! {
    println!(
        "{}: `{}` needs to be a numeric value",
        style("error").red(),
        style(name).cyan()
    );
    println!(
        "   {} `{}` is not a valid value",
        style("-->").cyan(),
        style(value.unwrap_or_default()).on_red()
    );
    process::exit(-1);
}

fn ask_retry() -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Connect the board and try again?")
        .default(true)
        .interact()
        .unwrap_or(false)
}

/// Progress of the file given on the command line.
struct FileProgress {
    bar: ProgressBar,
    total: u64,
    /// Buffers completed by the engine before the file was queued.
    completed_before: u64,
}

/// Queue the whole content of `path` and return a progress bar tracking the
/// bytes of it written so far.
fn stream_file(link: &mut Link, path: &str) -> Option<FileProgress> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) => {
            println!(
                "{}",
                style(format!("[BL] 🙁 could not read `{}`: {}", path, e)).yellow()
            );
            return None;
        }
    };
    if content.is_empty() {
        println!("{}", style(format!("[BL] 🙁 `{}` is empty", path)).yellow());
        return None;
    }
    let total = content.len() as u64;

    let bar = ProgressBar::new(total);
    bar.set_style(ProgressStyle::default_bar()
        .template("[BL] ⏩ Streaming [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        .progress_chars("=>-"));

    let completed_before = link.engine().stats().buffers_completed;
    if let Err(e) = link.submit(content) {
        bar.println(format!("[BL] 💥 {}, will retry with the next command", e));
    }
    Some(FileProgress {
        bar,
        total,
        completed_before,
    })
}

/// Forward stdin lines to the link. Runs until stdin is closed.
fn spawn_input(events: Sender<LinkEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!("stdin: {}", e);
                    break;
                }
            };
            let event = match line.trim() {
                "!quit" => LinkEvent::Shutdown,
                "!recipe" => LinkEvent::SendRaw(DEFAULT_RECIPE_REQUEST.to_vec()),
                "" => continue,
                _ => {
                    let mut command = line.into_bytes();
                    command.push(b'\n');
                    LinkEvent::Submit(command)
                }
            };
            if events.send(event).is_err() {
                break;
            }
        }
    });
}
