//! Unit loader for grafthost
//!
//! Unit code is a directive script in the same section format as the
//! descriptor: each `[Section]` is a loadable symbol. A symbol is either
//! function-style (`kind = function`, its `calls` directives run once at
//! load, nothing persists) or class-style (`kind = class`, yielding an
//! instance whose `on_start`/`on_stop` directives the registry drives and
//! whose `provides` directives graft new operations onto the host during
//! the attach phase).
//!
//! Directive keys:
//!
//! ```text
//! [Plugin1]
//! kind = class
//! on_start = sayHello plugin1
//! on_stop = sayGoodbye plugin1
//! provides = sayGoodbye => goodbye from {from}.
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{HostError, Result};
use crate::host::Host;

use super::manifest::{parse_sections, Section};
use super::source::CodeSource;
use super::types::EntryPointRef;

/// One capability invocation: `<operation> <argument>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityCall {
    pub operation: String,
    pub argument: String,
}

impl CapabilityCall {
    fn parse(value: &str) -> Self {
        match value.split_once(char::is_whitespace) {
            Some((operation, argument)) => Self {
                operation: operation.to_string(),
                argument: argument.trim().to_string(),
            },
            None => Self {
                operation: value.to_string(),
                argument: String::new(),
            },
        }
    }
}

/// One grafted operation: `<operation> => <template>`, where `{from}` in
/// the template is replaced by the invocation argument.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProvidedOp {
    operation: String,
    template: String,
}

/// A class-style unit instance. The registry owns it for its active
/// lifetime and drives `set_host`/`start`/`stop`.
pub struct UnitInstance {
    symbol: String,
    on_start: Vec<CapabilityCall>,
    on_stop: Vec<CapabilityCall>,
    provides: Vec<ProvidedOp>,
    host: Option<Arc<Host>>,
}

impl UnitInstance {
    /// Attach or detach the host handle. Attaching registers every
    /// `provides` operation onto the host extension table; detaching
    /// releases the back-reference so a stopped unit cannot retain a
    /// dangling capability surface.
    pub fn set_host(&mut self, host: Option<Arc<Host>>) {
        if let Some(host) = &host {
            for provided in &self.provides {
                let sink = host.sink();
                let template = provided.template.clone();
                host.register(
                    &provided.operation,
                    Arc::new(move |from: &str| {
                        sink(&template.replace("{from}", from));
                        Ok(())
                    }),
                );
            }
        }
        self.host = host;
    }

    /// Run the `on_start` directives against the attached host.
    pub fn start(&self) -> Result<()> {
        self.run_calls(&self.on_start, "start")
    }

    /// Run the `on_stop` directives against the attached host.
    pub fn stop(&self) -> Result<()> {
        self.run_calls(&self.on_stop, "stop")
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    fn run_calls(&self, calls: &[CapabilityCall], phase: &str) -> Result<()> {
        let host = self.host.as_ref().ok_or_else(|| {
            HostError::Lifecycle(format!("{}.{phase}: no host attached", self.symbol))
        })?;
        for call in calls {
            host.invoke(&call.operation, &call.argument).map_err(|e| {
                HostError::Lifecycle(format!("{}.{phase}: {e}", self.symbol))
            })?;
        }
        Ok(())
    }
}

/// Result of resolving and loading one entry point.
pub enum LoadedInstance {
    /// Function-style symbol: already invoked with the host handle at
    /// load time; nothing persists and there is no `stop`.
    RanOnce,
    /// Class-style symbol: an instance the registry drives.
    Instance(UnitInstance),
}

impl std::fmt::Debug for LoadedInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RanOnce => f.write_str("RanOnce"),
            Self::Instance(i) => f.debug_tuple("Instance").field(&i.symbol).finish(),
        }
    }
}


/// Resolve an entry point against a code root and load it.
///
/// The code root may be a plain directory tree or a mounted archive; the
/// resolution rule is identical. Fails with `Load` when the module file
/// is absent under the root or the symbol section is absent from the
/// module.
pub fn load(
    entry_point: &EntryPointRef,
    code_root: &dyn CodeSource,
    host: &Arc<Host>,
) -> Result<LoadedInstance> {
    let module_file = entry_point.module_file();
    if !code_root.contains(&module_file) {
        return Err(HostError::Load(format!(
            "module '{}' not found under {}",
            entry_point.module_path,
            code_root.describe()
        )));
    }

    let text = code_root.read(&module_file)?;
    let sections = parse_sections(&text);
    let section = sections
        .iter()
        .find(|s| s.name == entry_point.symbol_name)
        .ok_or_else(|| {
            HostError::Load(format!(
                "symbol '{}' not found in module '{}'",
                entry_point.symbol_name, entry_point.module_path
            ))
        })?;

    debug!(
        module = %entry_point.module_path,
        symbol = %entry_point.symbol_name,
        root = %code_root.describe(),
        "Resolved entry point"
    );
    load_symbol(section, host)
}

/// Load every symbol in a unit source text, in file order. Used for
/// loose-file units, which carry no manifest naming a single entry point.
pub fn load_source_text(text: &str, host: &Arc<Host>) -> Result<Vec<(String, LoadedInstance)>> {
    let sections = parse_sections(text);
    if sections.is_empty() {
        return Err(HostError::Load(
            "unit source defines no symbol sections".to_string(),
        ));
    }
    let mut loaded = Vec::with_capacity(sections.len());
    for section in &sections {
        loaded.push((section.name.clone(), load_symbol(section, host)?));
    }
    Ok(loaded)
}

/// Build one symbol from its parsed section.
fn load_symbol(section: &Section, host: &Arc<Host>) -> Result<LoadedInstance> {
    let kind = section.get("kind").ok_or_else(|| {
        HostError::Load(format!("symbol '{}' is missing 'kind'", section.name))
    })?;

    match kind {
        "function" => {
            // Run-once lifecycle: invoke immediately with the host handle.
            for value in section.get_all("calls") {
                let call = CapabilityCall::parse(value);
                host.invoke(&call.operation, &call.argument).map_err(|e| {
                    HostError::Lifecycle(format!("{}: {e}", section.name))
                })?;
            }
            info!(symbol = %section.name, "Ran function-style symbol");
            Ok(LoadedInstance::RanOnce)
        }
        "class" => {
            let instance = UnitInstance {
                symbol: section.name.clone(),
                on_start: section.get_all("on_start").map(CapabilityCall::parse).collect(),
                on_stop: section.get_all("on_stop").map(CapabilityCall::parse).collect(),
                provides: parse_provides(section)?,
                host: None,
            };
            Ok(LoadedInstance::Instance(instance))
        }
        other => Err(HostError::Load(format!(
            "symbol '{}' has unknown kind '{other}'",
            section.name
        ))),
    }
}

fn parse_provides(section: &Section) -> Result<Vec<ProvidedOp>> {
    section
        .get_all("provides")
        .map(|value| {
            let (operation, template) = value.split_once("=>").ok_or_else(|| {
                HostError::Load(format!(
                    "symbol '{}': provides '{value}' is missing '=>'",
                    section.name
                ))
            })?;
            Ok(ProvidedOp {
                operation: operation.trim().to_string(),
                template: template.trim().to_string(),
            })
        })
        .collect()
}
