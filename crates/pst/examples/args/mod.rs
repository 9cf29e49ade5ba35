use clap::Parser;

#[derive(Parser)]
#[command(version, about, long_about)]
pub struct Args {
    /// Path to a Unicode PST file.
    pub file: String,

    /// Node id of a message, e.g. `0x200024`.
    #[clap(long, value_parser = parse_node_id)]
    pub node: Option<u32>,
}

fn parse_node_id(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| format!("invalid node id {value:?}: {err}"))
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
