//! Recursive installation of a component's dependency graph.
//!
//! # Algorithm
//!
//! The graph is walked breadth-first in waves:
//!
//! 1. **Claim**: each pending requirement of the wave is checked against the visited
//!    map and, if its name is new, claimed. Claims happen one after another on the
//!    calling task, so two branches can never both fetch the same name.
//! 2. **Resolve**: claimed requirements are resolved concurrently
//!    (`futures::future::join_all`). Each one uses a linked entry, reuses an
//!    installed entry that satisfies it, or fetches through the store's staging
//!    protocol.
//! 3. **Check**: requirements whose name was already claimed are checked against the
//!    version that claim produced; an unsatisfied one is a
//!    [`EmbpmError::ConflictingRequirement`] naming both requirers.
//! 4. The dependencies of everything resolved in this wave form the next wave.
//!
//! Every requirement edge is recorded in a `petgraph` requirement graph, including
//! edges to names that were already claimed. Once the last wave is done, each
//! cycle in that graph is a [`EmbpmError::CyclicDependency`]; claims stop the walk
//! from looping, so cycles are found afterwards and never broken silently.
//! Failures never abort the walk: every error is collected and independent
//! branches keep resolving.
//!
//! # Stores
//!
//! Components are installed into `<project>/embpm_modules`, or into the global
//! modules store when acting globally. Only the destination changes; the algorithm
//! is the same.

mod graph;

use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::cache::{ComponentStore, InstallRecord, StoreEntry};
use crate::component::Component;
use crate::constants::MODULES_DIR;
use crate::core::EmbpmError;
use crate::source::ComponentFetcher;
use crate::target::TargetFilter;
use crate::version::{Version, VersionSpec};
use graph::RequirementGraph;

/// Requirer name used for the component an install starts from.
pub const ROOT_REQUIRER: &str = "(install request)";

/// Policy shared by every step of an install.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Identifiers selecting `targetDependencies` blocks
    pub target_filter: TargetFilter,
    /// Install into the global store instead of the project's
    pub act_globally: bool,
    /// Use developer links as-is and skip their dependencies
    pub install_linked: bool,
}

/// Install one named component and everything it depends on.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub name: String,
    pub spec: VersionSpec,
    pub options: InstallOptions,
}

/// How a component came to be in the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOrigin {
    Fetched,
    /// An installed entry already satisfied the requirement
    Reused,
    /// A developer link
    Linked,
}

/// A component present after an install.
#[derive(Debug, Clone)]
pub struct InstalledComponent {
    pub name: String,
    pub version: Version,
    pub path: PathBuf,
    /// Locator it was fetched from, when known
    pub source: Option<String>,
    pub origin: InstallOrigin,
}

impl InstalledComponent {
    fn satisfies(&self, spec: &VersionSpec) -> bool {
        if self.origin == InstallOrigin::Linked {
            return true;
        }
        match spec.locator() {
            Some(locator) => self.source.as_deref() == Some(locator.to_string().as_str()),
            None => spec.matches(&self.version),
        }
    }
}

/// Everything an install produced: the components it resolved and every error.
#[derive(Debug, Default)]
pub struct InstallOutcome {
    pub components: BTreeMap<String, InstalledComponent>,
    pub errors: Vec<EmbpmError>,
}

impl InstallOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Pending {
    name: String,
    spec: VersionSpec,
    requirer: String,
}

#[derive(Debug)]
struct Claim {
    spec: VersionSpec,
    requirer: String,
}

struct Resolved {
    component: Component,
    installed: InstalledComponent,
    /// Dependencies of this component are not walked
    skip_subtree: bool,
}

/// Installs dependency graphs into a project or the global store.
pub struct Installer<'a, F> {
    local: ComponentStore,
    global: ComponentStore,
    fetcher: &'a F,
}

impl<'a, F: ComponentFetcher> Installer<'a, F> {
    /// An installer for the project at `project_root`.
    ///
    /// # Errors
    ///
    /// Fails when the global modules directory cannot be determined.
    pub fn for_project(project_root: &Path, fetcher: &'a F) -> anyhow::Result<Self> {
        Ok(Self::with_stores(
            ComponentStore::modules(project_root.join(MODULES_DIR)),
            ComponentStore::modules(crate::config::global_modules_dir()?),
            fetcher,
        ))
    }

    pub fn with_stores(local: ComponentStore, global: ComponentStore, fetcher: &'a F) -> Self {
        Self {
            local,
            global,
            fetcher,
        }
    }

    fn store_for(&self, options: &InstallOptions) -> &ComponentStore {
        if options.act_globally {
            &self.global
        } else {
            &self.local
        }
    }

    /// Resolve `request.spec` for `request.name` and install it with its
    /// dependencies.
    pub async fn install_component(&self, request: &InstallRequest) -> InstallOutcome {
        tracing::info!(target: "installer", "installing {} {}", request.name, request.spec);
        let root = Pending {
            name: request.name.clone(),
            spec: request.spec.clone(),
            requirer: ROOT_REQUIRER.to_string(),
        };
        self.install_graph(vec![root], HashMap::new(), &request.options).await
    }

    /// Install the dependencies of a component already on disk (usually the
    /// application in the working directory).
    pub async fn install_dependencies(&self, component: &Component, options: &InstallOptions) -> InstallOutcome {
        tracing::info!(target: "installer", "installing dependencies of {}", component.name);
        let mut visited = HashMap::new();
        visited.insert(
            component.name.clone(),
            Claim {
                spec: VersionSpec::Exact(component.version.clone()),
                requirer: ROOT_REQUIRER.to_string(),
            },
        );
        let wave = component
            .dependencies_for(&options.target_filter)
            .into_iter()
            .map(|dep| Pending {
                name: dep.name,
                spec: dep.spec,
                requirer: component.name.clone(),
            })
            .collect();
        self.install_graph(wave, visited, options).await
    }

    async fn install_graph(
        &self,
        mut wave: Vec<Pending>,
        mut visited: HashMap<String, Claim>,
        options: &InstallOptions,
    ) -> InstallOutcome {
        let mut outcome = InstallOutcome::default();
        let mut graph = RequirementGraph::new();

        while !wave.is_empty() {
            let mut claimed = Vec::new();
            let mut deferred = Vec::new();

            for pending in wave {
                if pending.requirer != ROOT_REQUIRER {
                    graph.add_requirement(&pending.requirer, &pending.name);
                }
                if visited.contains_key(&pending.name) {
                    deferred.push(pending);
                } else {
                    visited.insert(
                        pending.name.clone(),
                        Claim {
                            spec: pending.spec.clone(),
                            requirer: pending.requirer.clone(),
                        },
                    );
                    claimed.push(pending);
                }
            }

            tracing::debug!(
                target: "installer",
                "wave: {} to resolve, {} already claimed",
                claimed.len(),
                deferred.len()
            );

            let results = join_all(claimed.iter().map(|pending| self.resolve_one(pending, options))).await;

            let mut next = Vec::new();
            for (pending, result) in claimed.into_iter().zip(results) {
                match result {
                    Ok(resolved) => {
                        if !resolved.skip_subtree {
                            for dep in resolved.component.dependencies_for(&options.target_filter) {
                                next.push(Pending {
                                    name: dep.name,
                                    spec: dep.spec,
                                    requirer: pending.name.clone(),
                                });
                            }
                        }
                        outcome.components.insert(pending.name.clone(), resolved.installed);
                    }
                    Err(error) => {
                        tracing::debug!(target: "installer", "{} failed: {error}", pending.name);
                        outcome.errors.push(error);
                    }
                }
            }

            for pending in deferred {
                let (Some(claim), Some(installed)) =
                    (visited.get(&pending.name), outcome.components.get(&pending.name))
                else {
                    // the claim failed and its error is already recorded
                    continue;
                };
                if !installed.satisfies(&pending.spec) {
                    outcome.errors.push(EmbpmError::ConflictingRequirement {
                        name: pending.name.clone(),
                        first_requirer: claim.requirer.clone(),
                        first_requirement: claim.spec.to_string(),
                        second_requirer: pending.requirer.clone(),
                        second_requirement: pending.spec.to_string(),
                    });
                }
            }

            wave = next;
        }

        for chain in graph.cycles() {
            tracing::debug!(target: "installer", "cycle: {}", chain.join(" -> "));
            outcome.errors.push(EmbpmError::CyclicDependency {
                chain,
            });
        }

        tracing::info!(
            target: "installer",
            "resolved {} component(s) with {} error(s)",
            outcome.components.len(),
            outcome.errors.len()
        );
        outcome
    }

    async fn resolve_one(&self, pending: &Pending, options: &InstallOptions) -> Result<Resolved, EmbpmError> {
        let store = self.store_for(options);
        let name = pending.name.as_str();
        let existing = store.lookup(name)?;

        if let Some(entry) = existing.as_ref().filter(|e| e.linked) {
            return linked(entry, options.install_linked);
        }

        if options.install_linked && !options.act_globally {
            if let Some(global_entry) = self.global.lookup(name)?.filter(|e| e.linked) {
                let developer_dir = std::fs::read_link(&global_entry.path)?;
                let entry = store.link(name, &developer_dir).await?;
                return linked(&entry, true);
            }
        }

        if let Some(entry) = existing {
            let component = Component::load(&entry.path)?;
            if entry.satisfies(&pending.spec, &component.version) {
                tracing::debug!(target: "installer", "{name}: installed version satisfies {}", pending.spec);
                let installed = installed_from(&entry, &component, InstallOrigin::Reused);
                return Ok(Resolved {
                    component,
                    installed,
                    skip_subtree: false,
                });
            }
            tracing::debug!(
                target: "installer",
                "{name}: installed {} does not satisfy {}",
                entry.installed_version(&component.version),
                pending.spec
            );
        }

        let fetcher = self.fetcher;
        let spec = &pending.spec;
        let entry = store
            .materialize(name, |dest| async move {
                fetcher.fetch(name, spec, &dest).await.map(InstallRecord::from)
            })
            .await?;
        let component = Component::load(&entry.path)?;
        if component.name != name {
            return Err(EmbpmError::InvalidManifest {
                path: entry.path.display().to_string(),
                reason: format!("expected component '{name}', manifest names '{}'", component.name),
            });
        }
        let installed = installed_from(&entry, &component, InstallOrigin::Fetched);
        Ok(Resolved {
            component,
            installed,
            skip_subtree: false,
        })
    }
}

fn linked(entry: &StoreEntry, skip_subtree: bool) -> Result<Resolved, EmbpmError> {
    let component = Component::load(&entry.path)?;
    tracing::debug!(target: "installer", "{}: using developer link {}", entry.name, entry.path.display());
    let installed = installed_from(entry, &component, InstallOrigin::Linked);
    Ok(Resolved {
        component,
        installed,
        skip_subtree,
    })
}

fn installed_from(entry: &StoreEntry, component: &Component, origin: InstallOrigin) -> InstalledComponent {
    InstalledComponent {
        name: entry.name.clone(),
        version: entry.installed_version(&component.version),
        path: entry.path.clone(),
        source: entry.record.as_ref().map(|r| r.source.clone()),
        origin,
    }
}
