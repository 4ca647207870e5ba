use crate::config::ManagerToml;
use crate::error::ProjectError;
use crate::supervisor::HugoManager;
use crate::{Result, env, project, web};
use miette::{IntoDiagnostic, WrapErr};
use std::path::PathBuf;
use std::sync::Arc;

/// Runs the web UI and supervises `hugo server` for a site
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Runs the web UI and supervises `hugo server` for a site

Settings are read from hugo-manager.toml in the site directory when it
exists. Flags given here take precedence over the file.

Examples:
  hugo-manager                          Serve the site in the current directory
  hugo-manager serve --dir ~/blog       Serve another site
  hugo-manager serve --hugo-args '--buildDrafts --navigateToChanged'
                                        Pass more arguments to hugo"
)]
pub struct Serve {
    /// Hugo site directory (defaults to the current directory)
    #[clap(short, long, env = "HUGO_MANAGER_DIR")]
    dir: Option<PathBuf>,
    /// Port for the web UI
    #[clap(short, long, env = "HUGO_MANAGER_PORT")]
    pub(super) port: Option<u16>,
    /// Port for `hugo server`
    #[clap(long, env = "HUGO_MANAGER_HUGO_PORT")]
    pub(super) hugo_port: Option<u16>,
    /// Don't launch hugo until asked to from the UI
    #[clap(long)]
    pub(super) no_auto_start: bool,
    /// More arguments for `hugo server`, split like a shell would and added
    /// after the configured ones
    #[clap(long, allow_hyphen_values = true)]
    hugo_args: Option<String>,
}

impl Serve {
    pub async fn run(&self) -> Result<()> {
        let dir = self.project_dir();
        if !project::is_hugo_project(&dir) {
            return Err(ProjectError::NotHugoProject { dir }.into());
        }

        let mut config = ManagerToml::load(&dir)?;
        self.apply(&mut config)?;
        config.validate()?;

        let manager = Arc::new(HugoManager::new(&dir, config.hugo.clone()));
        if config.hugo.auto_start {
            if let Err(err) = manager.start().await {
                warn!("hugo did not start: {err}");
            }
        } else {
            info!("auto start disabled, use the web UI to start hugo");
        }

        web::serve(manager, &config.server).await
    }

    fn project_dir(&self) -> PathBuf {
        let dir = match &self.dir {
            Some(dir) if dir.is_relative() => env::CWD.join(dir),
            Some(dir) => dir.clone(),
            None => env::CWD.clone(),
        };
        dir.canonicalize().unwrap_or(dir)
    }

    fn apply(&self, config: &mut ManagerToml) -> Result<()> {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(port) = self.hugo_port {
            config.hugo.port = port;
        }
        if self.no_auto_start {
            config.hugo.auto_start = false;
        }
        if let Some(args) = &self.hugo_args {
            let args = shell_words::split(args)
                .into_diagnostic()
                .wrap_err("invalid --hugo-args")?;
            config.hugo.additional_args.extend(args);
        }
        Ok(())
    }
}
