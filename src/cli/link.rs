//! Developer links for components and targets.
//!
//! Linking is two steps. Run `embpm link` inside a component's directory to make
//! it available user-wide, then `embpm link <name>` inside a project to use that
//! copy instead of an installed release. `link-target` does the same for targets.

use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;

use super::common::{CommandContext, resolve_dir};
use crate::cache::ComponentStore;
use crate::component::{Component, Target};

#[derive(Args, Debug)]
pub struct LinkCommand {
    /// Name of a globally linked component to use in this project; without it, the
    /// component in the current directory is linked globally
    name: Option<String>,

    /// Directory to link globally instead of the current directory
    #[arg(long, conflicts_with = "name")]
    dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LinkTargetCommand {
    /// Name of a globally linked target to use in this project; without it, the
    /// target in the current directory is linked globally
    name: Option<String>,

    /// Directory to link globally instead of the current directory
    #[arg(long, conflicts_with = "name")]
    dir: Option<PathBuf>,
}

impl LinkCommand {
    pub async fn execute(self, ctx: CommandContext) -> Result<i32> {
        let global = ctx.modules_store(true)?;
        match self.name {
            Some(name) => link_into_project(&global, &ctx.modules_store(false)?, &name).await,
            None => {
                let dir = resolve_dir(&ctx.working_dir, self.dir.as_deref())?;
                let component = Component::load(&dir)?;
                link_globally(&global, &component.name, dir).await
            }
        }
    }
}

impl LinkTargetCommand {
    pub async fn execute(self, ctx: CommandContext) -> Result<i32> {
        let global = ctx.targets_store(true)?;
        match self.name {
            Some(name) => link_into_project(&global, &ctx.targets_store(false)?, &name).await,
            None => {
                let dir = resolve_dir(&ctx.working_dir, self.dir.as_deref())?;
                let target = Target::load(&dir)?;
                link_globally(&global, &target.name, dir).await
            }
        }
    }
}

async fn link_globally(global: &ComponentStore, name: &str, dir: PathBuf) -> Result<i32> {
    let entry = global.link(name, &dir).await?;
    println!("{} -> {}", entry.path.display(), dir.display());
    Ok(0)
}

async fn link_into_project(global: &ComponentStore, local: &ComponentStore, name: &str) -> Result<i32> {
    let Some(entry) = global.lookup(name)?.filter(|e| e.linked) else {
        bail!("'{name}' is not linked globally; run 'embpm link' in its directory first");
    };
    let developer_dir = std::fs::read_link(&entry.path)?;
    let linked = local.link(name, &developer_dir).await?;
    println!("{} -> {}", linked.path.display(), developer_dir.display());
    Ok(0)
}
