use std::io::Write;

use nu_ansi_term::Color::{Blue, Magenta, Red, Yellow};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields, MakeWriter},
    registry::LookupSpan,
};

use crate::{cli::Args, utils::Colored};

/// Collects the message and the package name of an event.
#[derive(Default)]
struct EventFields {
    message: Option<String>,
    name: Option<String>,
}

impl tracing::field::Visit for EventFields {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "name" => self.name = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

fn level_prefix(level: Level) -> Option<Colored<&'static str>> {
    match level {
        Level::TRACE => Some(Colored(Magenta, "[TRACE]")),
        Level::DEBUG => Some(Colored(Blue, "[DEBUG]")),
        Level::INFO => None,
        Level::WARN => Some(Colored(Yellow, "[WARN]")),
        Level::ERROR => Some(Colored(Red, "[ERROR]")),
    }
}

/// `[LEVEL] [name] message`, with no prefix on INFO lines.
pub struct CompactFormatter;

impl<S, N> FormatEvent<S, N> for CompactFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut fields = EventFields::default();
        event.record(&mut fields);

        if let Some(prefix) = level_prefix(*event.metadata().level()) {
            write!(writer, "{prefix} ")?;
        }
        if let Some(name) = fields.name {
            write!(writer, "[{name}] ")?;
        }
        writeln!(writer, "{}", fields.message.unwrap_or_default())
    }
}

struct WriterBuilder;

/// Routes INFO to stdout and everything else to stderr.
enum LevelWriter {
    Stdout(std::io::Stdout),
    Stderr(std::io::Stderr),
}

impl Write for LevelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            LevelWriter::Stdout(out) => out.write(buf),
            LevelWriter::Stderr(err) => err.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            LevelWriter::Stdout(out) => out.flush(),
            LevelWriter::Stderr(err) => err.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for WriterBuilder {
    type Writer = LevelWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LevelWriter::Stdout(std::io::stdout())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        if meta.level() == &Level::INFO {
            LevelWriter::Stdout(std::io::stdout())
        } else {
            LevelWriter::Stderr(std::io::stderr())
        }
    }
}

pub fn setup_logging(args: &Args) {
    let filter_level = match (args.quiet, args.verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(format!("mirra={filter_level}"))
        .with_target(false)
        .with_writer(WriterBuilder)
        .without_time();

    let subscriber: Box<dyn Subscriber + Send + Sync> = if args.json {
        Box::new(builder.json().flatten_event(true).finish())
    } else {
        Box::new(builder.event_format(CompactFormatter).finish())
    };

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }
}
