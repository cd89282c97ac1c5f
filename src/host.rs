//! Host capability surface for grafthost
//!
//! The host exposes a small set of operations to every loaded unit. The set
//! is not fixed: units may graft additional operations onto the host at
//! runtime through the extension table. The table is keyed by operation
//! name, starts with the built-in operations, and never shrinks during a
//! run — it is reset only by constructing a fresh `Host` at restart.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::error::{HostError, Result};

/// A host operation: takes the caller-supplied argument (typically the
/// calling unit's name) and performs its effect.
pub type CapabilityFn = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Where host operations write their observable output. Injectable so tests
/// can capture lines instead of reading stdout.
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

/// The host's extensible capability surface.
///
/// Writes to the extension table are serialized by the interior lock, so
/// units registering overlapping operation names cannot interleave. When
/// two units register the same name, the last registration wins and no
/// conflict is reported — an explicit escape hatch, not an oversight.
pub struct Host {
    table: RwLock<HashMap<String, CapabilityFn>>,
    sink: OutputSink,
}

impl Host {
    /// Create a host whose operations print to stdout.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(|line: &str| println!("{line}")))
    }

    /// Create a host with a custom output sink.
    pub fn with_sink(sink: OutputSink) -> Self {
        let host = Self {
            table: RwLock::new(HashMap::new()),
            sink,
        };
        host.install_builtins();
        host
    }

    fn install_builtins(&self) {
        let sink = self.sink.clone();
        let say_hello: CapabilityFn = Arc::new(move |from: &str| {
            sink(&format!("hello from {from}."));
            Ok(())
        });
        self.table
            .write()
            .expect("host table lock poisoned")
            .insert("sayHello".to_string(), say_hello);
    }

    /// Register (or overwrite) an operation on the extension table.
    ///
    /// Last registration wins; duplicates are not treated as conflicts.
    pub fn register(&self, name: &str, operation: CapabilityFn) {
        let replaced = self
            .table
            .write()
            .expect("host table lock poisoned")
            .insert(name.to_string(), operation)
            .is_some();
        if replaced {
            info!(operation = %name, "Replaced host operation");
        } else {
            info!(operation = %name, "Registered host operation");
        }
    }

    /// Invoke a registered operation by name.
    pub fn invoke(&self, name: &str, arg: &str) -> Result<()> {
        let operation = {
            let table = self.table.read().expect("host table lock poisoned");
            table.get(name).cloned()
        };
        match operation {
            Some(op) => {
                debug!(operation = %name, arg = %arg, "Invoking host operation");
                op(arg)
            }
            None => Err(HostError::CapabilityNotFound(name.to_string())),
        }
    }

    /// Whether an operation is currently registered.
    pub fn has_operation(&self, name: &str) -> bool {
        self.table
            .read()
            .expect("host table lock poisoned")
            .contains_key(name)
    }

    /// Sorted snapshot of registered operation names.
    pub fn operation_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .table
            .read()
            .expect("host table lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// The host's output sink, for operations that emit text.
    pub fn sink(&self) -> OutputSink {
        self.sink.clone()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Host plus a handle on everything its operations emitted.
    fn capture_host() -> (Host, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = lines.clone();
        let host = Host::with_sink(Arc::new(move |line: &str| {
            captured.lock().unwrap().push(line.to_string());
        }));
        (host, lines)
    }

    #[test]
    fn test_builtin_say_hello() {
        let (host, lines) = capture_host();
        host.invoke("sayHello", "plugin1").unwrap();
        assert_eq!(lines.lock().unwrap().as_slice(), ["hello from plugin1."]);
    }

    #[test]
    fn test_unregistered_operation_fails() {
        let (host, _) = capture_host();
        let err = host.invoke("sayGoodbye", "plugin1").unwrap_err();
        assert!(matches!(err, HostError::CapabilityNotFound(name) if name == "sayGoodbye"));
    }

    #[test]
    fn test_register_then_invoke() {
        let (host, lines) = capture_host();
        let sink = host.sink();
        host.register(
            "sayGoodbye",
            Arc::new(move |from: &str| {
                sink(&format!("goodbye from {from}."));
                Ok(())
            }),
        );
        host.invoke("sayGoodbye", "plugin2").unwrap();
        assert_eq!(lines.lock().unwrap().as_slice(), ["goodbye from plugin2."]);
    }

    #[test]
    fn test_last_registration_wins() {
        let (host, lines) = capture_host();
        let first = host.sink();
        host.register(
            "shout",
            Arc::new(move |_: &str| {
                first("first");
                Ok(())
            }),
        );
        let second = host.sink();
        host.register(
            "shout",
            Arc::new(move |_: &str| {
                second("second");
                Ok(())
            }),
        );
        host.invoke("shout", "anyone").unwrap();
        assert_eq!(lines.lock().unwrap().as_slice(), ["second"]);
    }

    #[test]
    fn test_table_never_shrinks_on_overwrite() {
        let (host, _) = capture_host();
        host.register("extra", Arc::new(|_| Ok(())));
        host.register("extra", Arc::new(|_| Ok(())));
        assert_eq!(host.operation_names(), ["extra", "sayHello"]);
    }

    #[test]
    fn test_has_operation() {
        let (host, _) = capture_host();
        assert!(host.has_operation("sayHello"));
        assert!(!host.has_operation("sayGoodbye"));
    }
}
