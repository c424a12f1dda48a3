//! Show or set the build target.
//!
//! Without an argument, prints the current target hierarchy from whatever is
//! already installed (no network access) and exits with the number of errors met
//! while walking it. With a target spec, validates it, stores it as `build.target`
//! and, inside a module, installs the target hierarchy.
//!
//! ```bash
//! embpm target                          # show the hierarchy
//! embpm target frdm-k64f-gcc            # stored as "frdm-k64f-gcc,*"
//! embpm target -g x86-linux-native,^1.0 # stored in ~/.embpm/config.toml
//! embpm target -n k64f,ARMmbed/target-k64f
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::CommandContext;
use crate::config::{BUILD_SECTION, Scope, SettingsStore, TARGET_KEY, TARGET_SET_EXPLICITLY_KEY};
use crate::core::create_error_context;
use crate::target::{DerivedTarget, HierarchyEntry, TargetHierarchyResolver, parse_target_spec};

#[derive(Args, Debug)]
pub struct TargetCommand {
    /// Target to build for: name[,version-spec-or-repository]
    set_target: Option<String>,

    /// Set the target for every project of this user
    #[arg(short, long)]
    global: bool,

    /// Do not install the target hierarchy
    #[arg(short = 'n', long)]
    no_install: bool,
}

impl TargetCommand {
    pub async fn execute(self, mut ctx: CommandContext) -> Result<i32> {
        match self.set_target.as_deref() {
            None => display_current_target(&ctx).await,
            Some(text) => {
                let code = set_target(&mut ctx, text, self.global, self.no_install).await?;
                Ok(code)
            }
        }
    }
}

async fn display_current_target(ctx: &CommandContext) -> Result<i32> {
    let Some(spec) = ctx.current_target()? else {
        println!("no target set, use 'embpm target <name>' to set one");
        return Ok(0);
    };

    let store = ctx.targets_store(false)?;
    let fetcher = ctx.fetcher();
    let outcome = TargetHierarchyResolver::new(&store, &fetcher).get_derived_target(&spec, false).await;

    match &outcome.derived {
        Some(derived) => print_hierarchy(derived),
        None => println!("{} {} {}", spec.name, spec.requirement, "missing".red()),
    }
    for error in &outcome.errors {
        tracing::error!(target: "target", "{error}");
    }

    Ok(i32::try_from(outcome.errors.len()).unwrap_or(i32::MAX))
}

fn print_hierarchy(derived: &DerivedTarget) {
    for entry in derived.entries() {
        match entry {
            HierarchyEntry::Resolved(target) => {
                let line = format!("{} {}", target.name, target.version);
                if target.installed_linked {
                    let real = target.path.canonicalize().unwrap_or_else(|_| target.path.clone());
                    println!("{line} -> {}", real.display().to_string().dimmed());
                } else {
                    println!("{line}");
                }
            }
            HierarchyEntry::Missing {
                name,
                requirement,
            } => println!("{name} {requirement} {}", "missing".red()),
        }
    }
}

async fn set_target(ctx: &mut CommandContext, text: &str, global: bool, no_install: bool) -> Result<i32> {
    let parsed = match parse_target_spec(text) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::error!(target: "target", "Invalid target: \"{text}\"");
            tracing::debug!(target: "target", "{e}");
            return Ok(1);
        }
    };

    let scope = if global {
        Scope::Global
    } else {
        Scope::Local
    };
    let persisted = parsed.to_persisted();
    ctx.settings.set(scope, BUILD_SECTION, TARGET_KEY, persisted.clone().into())?;
    ctx.settings.set(scope, BUILD_SECTION, TARGET_SET_EXPLICITLY_KEY, true.into())?;
    ctx.settings.save().await?;
    tracing::info!(target: "target", "{scope} target set to {persisted}");

    if no_install || !ctx.has_module() {
        return Ok(0);
    }

    // the hierarchy always lives with the application, whatever the setting's scope
    let spec = parsed.to_target_spec()?;
    let store = ctx.targets_store(false)?;
    let fetcher = ctx.fetcher();
    let outcome = TargetHierarchyResolver::new(&store, &fetcher).get_derived_target(&spec, true).await;

    if outcome.errors.is_empty() {
        if let Some(derived) = &outcome.derived {
            print_hierarchy(derived);
        }
        return Ok(0);
    }

    for error in outcome.errors {
        create_error_context(error).display();
    }
    tracing::error!(
        target: "target",
        "failed to install the target hierarchy; use 'embpm link-target' to use a development copy of a target"
    );
    Ok(1)
}
