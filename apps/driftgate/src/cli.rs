use clap::Parser;
use driftgate_config::GlobalConfigPatch;

#[derive(Parser)]
#[command(name = "driftgate")]
pub(crate) struct Cli {
    /// YAML or JSON config file, merged under environment variables and
    /// built-in defaults (`driftgate-config`'s layering order).
    #[arg(long)]
    pub(crate) config: Option<String>,
    #[arg(long, env = "DRIFTGATE_HOST")]
    pub(crate) host: Option<String>,
    #[arg(long, env = "DRIFTGATE_PORT")]
    pub(crate) port: Option<u16>,
}

impl Cli {
    /// CLI flags outrank both the config file and the environment, matching
    /// the teacher's precedence order for its own `--host`/`--port`/`--proxy`
    /// overrides.
    pub(crate) fn as_patch(&self) -> GlobalConfigPatch {
        GlobalConfigPatch {
            host: self.host.clone(),
            port: self.port,
            ..Default::default()
        }
    }
}
