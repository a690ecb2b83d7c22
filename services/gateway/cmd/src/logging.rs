//! Console log format for the gateway client.
//!
//! Lines look like
//! `[2026-01-01 12:00:00.000] [gateway-heartbeat   ] [ℹ INFO   ] message key=value`.

use std::fmt::{self, Write as _};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

const COMPONENT_WIDTH: usize = 20;
const LOG_LEVEL_WIDTH: usize = 9;

/// Event formatter naming each line after the module that logged it
pub struct GatewayLogFormatter {
    service_name: String,
    color_enabled: bool,
}

impl GatewayLogFormatter {
    /// Formatter for `service_name`, with colour when the terminal supports it
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            color_enabled: is_terminal(),
        }
    }

    /// Component column: an explicit `component` field wins over the target
    fn format_component(&self, component: Option<&str>, target: &str) -> String {
        let name = match component.or_else(|| target_component(target)) {
            Some(comp) => format!("{}-{}", self.service_name, comp),
            None => self.service_name.clone(),
        };

        if name.chars().count() > COMPONENT_WIDTH {
            let truncated: String = name.chars().take(COMPONENT_WIDTH - 1).collect();
            format!("{}…", truncated)
        } else {
            format!("{:<width$}", name, width = COMPONENT_WIDTH)
        }
    }

    fn format_log_level(level: &Level) -> String {
        let level_str = match *level {
            Level::ERROR => "✗ ERROR",
            Level::WARN => "⚠ WARN",
            Level::INFO => "ℹ INFO",
            Level::DEBUG => "◦ DEBUG",
            Level::TRACE => "◦ TRACE",
        };
        format!("{:<width$}", level_str, width = LOG_LEVEL_WIDTH)
    }

    fn color_for_level(&self, level: &Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }
        match *level {
            Level::ERROR => COLOR_BRIGHT_RED,
            Level::WARN => COLOR_BRIGHT_YELLOW,
            Level::INFO => COLOR_GREEN,
            Level::DEBUG | Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

/// Last path segment of a target, skipping the crate root
fn target_component(target: &str) -> Option<&str> {
    target.rsplit_once("::").map(|(_, last)| last)
}

impl<S, N> FormatEvent<S, N> for GatewayLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let metadata = event.metadata();
        let level = metadata.level();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let component = self.format_component(visitor.component.as_deref(), metadata.target());
        let color = self.color_for_level(level);
        let (reset, cyan) = if self.color_enabled {
            (COLOR_RESET, COLOR_CYAN)
        } else {
            ("", "")
        };

        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] ",
            cyan,
            timestamp,
            component,
            color,
            Self::format_log_level(level),
            reset
        )?;
        writeln!(writer, "{}{}{}", visitor.message, visitor.fields, reset)
    }
}

/// Collects the message, the optional `component`, and every other field
#[derive(Default)]
struct FieldVisitor {
    message: String,
    component: Option<String>,
    fields: String,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            name => {
                let _ = write!(self.fields, " {}={}", name, value);
            }
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "component" => {
                self.component = Some(format!("{:?}", value).trim_matches('"').to_string())
            }
            name => {
                let _ = write!(self.fields, " {}={:?}", name, value);
            }
        }
    }
}

fn is_terminal() -> bool {
    match std::env::var("TERM") {
        Ok(term) => term != "dumb",
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter() -> GatewayLogFormatter {
        GatewayLogFormatter {
            service_name: "gateway".to_string(),
            color_enabled: false,
        }
    }

    #[test]
    fn test_component_from_target() {
        let f = formatter();
        assert_eq!(
            f.format_component(None, "gateway_session::heartbeat").trim_end(),
            "gateway-heartbeat"
        );
        assert_eq!(f.format_component(None, "redb_gateway").trim_end(), "gateway");
        assert_eq!(
            f.format_component(Some("signals"), "gateway_session::shutdown").trim_end(),
            "gateway-signals"
        );
    }

    #[test]
    fn test_long_component_is_truncated() {
        let name = formatter().format_component(Some("a-very-long-component-name"), "x");
        assert_eq!(name.chars().count(), COMPONENT_WIDTH);
        assert!(name.ends_with('…'));
    }

    #[test]
    fn test_level_column_width() {
        assert_eq!(
            GatewayLogFormatter::format_log_level(&Level::WARN).chars().count(),
            LOG_LEVEL_WIDTH
        );
        assert!(formatter().color_for_level(&Level::ERROR).is_empty());
    }
}
