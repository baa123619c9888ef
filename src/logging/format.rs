use colored::Color;
use std::fmt::{self, Debug, Display, Write};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

const TRACE_ID_FIELD: &str = "trace_id=";

/// Single-line event format:
/// `[time LVL] target@trace_id{span fields}: message key=value`.
pub(super) struct Formatter {
    use_colors: bool,
}

impl Formatter {
    pub(super) fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }
}

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let mut context = meta.target().to_string();
        let mut span_fields = Vec::new();
        for span in ctx
            .event_scope()
            .into_iter()
            .flat_map(tracing_subscriber::registry::Scope::from_root)
        {
            let exts = span.extensions();
            let Some(fields) = exts.get::<FormattedFields<N>>() else {
                continue;
            };
            if let Some(trace_id) = fields.strip_prefix(TRACE_ID_FIELD) {
                write!(context, "@{trace_id}")?;
            } else if !fields.is_empty() {
                span_fields.push(fields.to_string());
            }
        }
        if !span_fields.is_empty() {
            write!(context, "{{{}}}", span_fields.join(" "))?;
        }

        let now = chrono::Local::now();
        if self.use_colors {
            write!(
                writer,
                "[{} {}] {} {}",
                Paint(Color::BrightBlack, now.format("%X%.3f")),
                Paint(level_color(meta.level()), level_label(meta.level())),
                Paint(Color::BrightBlack, format!("{context}:")),
                visitor
            )?;
        } else {
            write!(
                writer,
                "{} [{}] {}: {}",
                now.format("%F %X%.3f"),
                level_label(meta.level()),
                context,
                visitor
            )?;
        }
        writeln!(writer)
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: String,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            write!(self.message, "{value:?}").ok();
        } else {
            write!(self.fields, " {}={:?}", field.name(), value).ok();
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            write!(self.fields, " {}={}", field.name(), value).ok();
        }
    }
}

impl Display for EventVisitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        f.write_str(&self.fields)
    }
}

fn level_label(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERR",
        Level::WARN => "WRN",
        Level::INFO => "INF",
        Level::DEBUG => "DBG",
        Level::TRACE => "TRC",
    }
}

fn level_color(level: &Level) -> Color {
    match *level {
        Level::ERROR => Color::BrightRed,
        Level::WARN => Color::BrightYellow,
        Level::INFO => Color::BrightBlue,
        Level::DEBUG => Color::BrightMagenta,
        Level::TRACE => Color::BrightWhite,
    }
}

struct Paint<T>(Color, T);

impl<T: Display> Display for Paint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1B[{}m{}\x1B[0m", self.0.to_fg_str(), self.1)
    }
}
