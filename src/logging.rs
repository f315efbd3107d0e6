use anyhow::Result;
use tenantgate_config::{LogConfig, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `log.level`. Output goes to stderr so `call` and
/// `query` keep stdout for results.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = std::env::var("RUST_LOG")
        .map_or_else(|_| EnvFilter::try_new(&config.level), EnvFilter::try_new)?
        .add_directive("hyper=warn".parse()?)
        .add_directive("rquest=warn".parse()?)
        .add_directive("tower_http=info".parse()?);

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()?,
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init()?,
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()?,
    }
    Ok(())
}
