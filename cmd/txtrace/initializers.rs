use std::io::IsTerminal;

use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::Directive, fmt, layer::SubscriberExt,
};

use crate::cli::{LogColor, Options};

/// Logs go to stderr so that stdout only ever carries the trace output.
pub fn init_tracing(opts: &Options) -> eyre::Result<()> {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let use_color = match opts.log_color {
        LogColor::Always => true,
        LogColor::Never => false,
        LogColor::Auto => std::io::stderr().is_terminal(),
    };

    let include_target = matches!(opts.log_level, Level::DEBUG | Level::TRACE);

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(include_target)
        .with_ansi(use_color);

    let subscriber = Registry::default().with(fmt_layer.with_filter(log_filter));
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| eyre::eyre!("setting default subscriber failed: {e}"))?;

    Ok(())
}
