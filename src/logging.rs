use tracing_subscriber::EnvFilter;

/// Directives for `--debug`: the filter's own spans at debug, the wgpu stack
/// kept at warn since its debug output is per-call.
const DEBUG_DIRECTIVES: &str = "kuwahara_wgpu=debug,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Installs a stderr fmt subscriber and forwards `log` records (adapter
/// selection in wgpu logs through `log`) into it. Repeated calls are ignored.
pub fn init_tracing(enable_debug: bool) {
    let _ = tracing_log::LogTracer::init();

    let env_filter = if enable_debug {
        EnvFilter::new(DEBUG_DIRECTIVES)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(enable_debug)
        .try_init()
        .ok();
}
