use anyhow::Result;

/// Installs the default subscriber for binaries built on this crate: `RUST_LOG`
/// filtering (falling back to `default_filter`) and a formatted layer with
/// targets and thread ids.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        let _ = init_tracing("msid_trend=debug");
        assert!(init_tracing("msid_trend=debug").is_err());
    }
}
