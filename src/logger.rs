use log::*;
use std::io::{self, Write};
use termcolor::*;

/// The logger instance installed by [`StandardLogger::setup`].
pub static LOGGER: StandardLogger = StandardLogger();

const FRAME: Color = Color::Rgb(0x7f, 0x8c, 0x8d);

///
/// A colored terminal logger for queue selection, calibration
/// and resize diagnostics.
///
/// Errors are written to stderr, everything else to stdout.
///
#[derive(Debug)]
pub struct StandardLogger();

impl StandardLogger {
    ///
    /// Installs the logger with the given maximum level.
    ///
    /// # Errors
    ///
    /// Fails if another logger was already installed.
    ///
    pub fn setup(level: LevelFilter) -> Result<(), SetLoggerError> {
        set_logger(&LOGGER).map(|()| set_max_level(level))
    }

    fn level_color(level: Level) -> Color {
        match level {
            Level::Debug => Color::Cyan,
            Level::Trace => Color::Magenta,
            Level::Info => Color::Green,
            Level::Warn => Color::Yellow,
            Level::Error => Color::Red,
        }
    }

    fn write_record(stream: &mut impl WriteColor, record: &Record) -> io::Result<()> {
        stream.set_color(ColorSpec::new().set_fg(Some(FRAME)))?;
        write!(stream, "[ ")?;

        stream.set_color(ColorSpec::new().set_fg(Some(Self::level_color(record.level()))))?;
        write!(stream, "{:>5} {:>20}", record.level(), record.target())?;

        stream.set_color(ColorSpec::new().set_fg(Some(FRAME)))?;
        write!(stream, " ] ")?;

        stream.reset()?;
        writeln!(stream, "{}", record.args())
    }
}

impl Log for StandardLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let mut stream = match record.level() {
                Level::Error => StandardStream::stderr(ColorChoice::Auto),
                _ => StandardStream::stdout(ColorChoice::Auto),
            };

            // a broken terminal must not abort the simulation
            let _ = Self::write_record(&mut stream, record);
        }
    }

    fn flush(&self) {}
}
