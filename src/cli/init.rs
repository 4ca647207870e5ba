use crate::config::ManagerToml;
use crate::{Result, env};
use std::path::PathBuf;

/// Writes hugo-manager.toml for a site
///
/// A new file gets the default settings. An existing file is validated and
/// rewritten with every setting spelled out.
#[derive(Debug, clap::Args)]
#[clap(verbatim_doc_comment)]
pub struct Init {
    /// Hugo site directory (defaults to the current directory)
    #[clap(short, long)]
    dir: Option<PathBuf>,
}

impl Init {
    pub async fn run(&self) -> Result<()> {
        let dir = self.dir.clone().unwrap_or_else(|| env::CWD.clone());
        let config = ManagerToml::load(&dir)?;
        config.write()
    }
}
