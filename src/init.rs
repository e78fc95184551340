use ctor::ctor;

#[ctor]
fn init() {
    // Clip-level detail sits at debug; RUST_LOG overrides the default.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
