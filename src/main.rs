use std::path::PathBuf;
use std::time::Duration;

use clap::{App, Arg};
use colored::Colorize;
use log::{error, info};

use pmlogd::config::Config;
use pmlogd::core::Core;
use pmlogd::pidfile::PidFile;
use pmlogd::receiver::Receiver;
use pmlogd::signals;

fn init_logging(foreground: bool) {
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Info);

    let dispatch = if foreground {
        dispatch.chain(std::io::stderr())
    } else {
        match fern::log_file("/var/log/pmlogd.diag.log") {
            Ok(file) => dispatch.chain(file),
            Err(_) => dispatch.chain(std::io::stderr()),
        }
    };

    if dispatch.apply().is_err() {
        eprintln!("{}", "logger already initialized".red());
    }
}

fn hostname() -> String {
    let mut buf = vec![0u8; 256];
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if ret == 0 {
        let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        String::from_utf8_lossy(&buf[..len]).into_owned()
    } else {
        "localhost".to_string()
    }
}

fn main() {
    let matches = App::new("pmlogd")
        .about("PmLogDaemon: syslog message router with size-rotated outputs")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .default_value("/etc/pmlogd.conf")
                .help("path to the pmlogd configuration file"),
        )
        .arg(
            Arg::with_name("pidfile")
                .short("p")
                .long("pidfile")
                .takes_value(true)
                .default_value("/tmp/run/pmlogd.pid")
                .help("path to the advisory PID lock file"),
        )
        .arg(
            Arg::with_name("socket")
                .short("s")
                .long("socket")
                .takes_value(true)
                .default_value("/tmp/run/pmlogd.sock")
                .help("Unix datagram socket producers submit messages on"),
        )
        .arg(
            Arg::with_name("foreground")
                .short("f")
                .long("foreground")
                .help("log diagnostics to stderr instead of the fallback diagnostics file"),
        )
        .get_matches();

    let foreground = matches.is_present("foreground");
    init_logging(foreground);

    let pidfile_path = PathBuf::from(matches.value_of("pidfile").unwrap());
    let _pidfile = match PidFile::acquire(&pidfile_path) {
        Ok(p) => p,
        Err(e) => {
            error!("could not acquire pid lock at {:?}: {}", pidfile_path, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = signals::install() {
        error!("could not install signal handlers: {}", e);
        std::process::exit(1);
    }

    let config_path = PathBuf::from(matches.value_of("config").unwrap());
    let config = Config::load(&config_path);
    let mut core = Core::new(config);

    let socket_path = PathBuf::from(matches.value_of("socket").unwrap());
    let receiver = match Receiver::bind(&socket_path) {
        Ok(r) => r,
        Err(e) => {
            error!("could not bind receiver socket {:?}: {}", socket_path, e);
            std::process::exit(1);
        }
    };
    receiver.set_timeout(Duration::from_millis(200));

    let host = hostname();
    info!(
        "pmlogd started, config={:?} socket={:?}",
        config_path, socket_path
    );

    while !signals::shutdown_requested() {
        receiver.recv_one(&mut core, &host);
    }

    info!("shutdown requested, draining ring buffers");
    core.shutdown();
    info!("pmlogd exiting cleanly");
}
