//! Install a component, or the dependencies of the current module.
//!
//! ```bash
//! embpm install                           # dependencies of ./module.json
//! embpm install mbed-drivers@^0.11.0      # a named component from [sources]
//! embpm install ARMmbed/sockets#v1.0.2    # a remote pin
//! embpm install --global --install-linked
//! ```
//!
//! `targetDependencies` blocks are selected by the target hierarchy of `--target`,
//! or of `build.target` when no target is given.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;

use super::common::CommandContext;
use crate::core::create_error_context;
use crate::installer::{InstallOptions, InstallOrigin, InstallOutcome, InstallRequest, Installer};
use crate::locator::{Locator, RepositoryAddress};
use crate::target::{TargetFilter, TargetHierarchyResolver, TargetSpec};
use crate::version::VersionSpec;

#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Component to install: name[@version-spec] or a repository locator
    component: Option<String>,

    /// Install into the user-wide store
    #[arg(short, long)]
    global: bool,

    /// Use linked development copies as-is, without installing their dependencies
    #[arg(long)]
    install_linked: bool,

    /// Target whose hierarchy selects target-specific dependencies
    #[arg(short, long, value_name = "SPEC")]
    target: Option<String>,
}

impl InstallCommand {
    pub async fn execute(self, ctx: CommandContext) -> Result<i32> {
        let target_filter = self.target_filter(&ctx).await?;
        let options = InstallOptions {
            target_filter,
            act_globally: self.global,
            install_linked: self.install_linked,
        };

        let fetcher = ctx.fetcher();
        let installer = Installer::with_stores(ctx.modules_store(false)?, ctx.modules_store(true)?, &fetcher);

        let outcome = match self.component.as_deref() {
            Some(text) => {
                let (name, spec) = parse_component_arg(text)?;
                installer
                    .install_component(&InstallRequest {
                        name,
                        spec,
                        options,
                    })
                    .await
            }
            None => {
                let Some(module) = ctx.module()? else {
                    bail!("No module.json in {}; name a component to install", ctx.working_dir.display());
                };
                installer.install_dependencies(&module, &options).await
            }
        };

        Ok(report(outcome))
    }

    async fn target_filter(&self, ctx: &CommandContext) -> Result<TargetFilter> {
        let spec = match self.target.as_deref() {
            Some(text) => Some(TargetSpec::parse(text)?),
            None => ctx.current_target()?,
        };
        let Some(spec) = spec else {
            return Ok(TargetFilter::default());
        };

        let store = ctx.targets_store(false)?;
        let fetcher = ctx.fetcher();
        let outcome = TargetHierarchyResolver::new(&store, &fetcher).get_derived_target(&spec, false).await;
        for error in &outcome.errors {
            tracing::warn!(target: "installer", "{error}");
        }
        Ok(match &outcome.derived {
            Some(derived) => TargetFilter::from_derived(derived),
            None => TargetFilter::from_spec(&spec),
        })
    }
}

/// Split `name@spec`, or take name and pin from a repository locator.
fn parse_component_arg(text: &str) -> Result<(String, VersionSpec)> {
    if RepositoryAddress::looks_like(text) {
        let locator = Locator::parse(text)?;
        let name = locator.address().project_name();
        return Ok((name, VersionSpec::RemotePin(locator)));
    }
    match text.split_once('@') {
        Some((name, spec)) => Ok((name.to_string(), VersionSpec::parse(spec)?)),
        None => Ok((text.to_string(), VersionSpec::Any)),
    }
}

fn report(outcome: InstallOutcome) -> i32 {
    for component in outcome.components.values() {
        let line = format!("{} {}", component.name, component.version);
        match component.origin {
            InstallOrigin::Linked => println!("{line} -> {}", component.path.display().to_string().dimmed()),
            InstallOrigin::Fetched => println!("{line} {}", "(installed)".green()),
            InstallOrigin::Reused => println!("{line}"),
        }
    }

    if outcome.errors.is_empty() {
        return 0;
    }
    for error in outcome.errors {
        create_error_context(error).display();
    }
    1
}
