//! Categorical Types
//!
//! Every configuration choice (framework, device, timer, model, ...) is a
//! [`CategoricalValue`]: a `(domain, name, tag)` triple drawn from a
//! per-domain table. Tables start with the built-in members, always contain
//! an `UNKNOWN` fallback, and can be extended at startup by plugins
//! submitted through [`inventory`].

use crate::error::DuplicateDefinitionError;
use fxhash::FxHashMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// Name of the fallback member present in every domain
pub const UNKNOWN_NAME: &str = "UNKNOWN";
/// Tag of the fallback member present in every domain
pub const UNKNOWN_TAG: &str = "unknown";

/// Category a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// `inference` / `training`
    RunMode,
    /// Framework providing workloads, executors and data
    Framework,
    /// Execution device
    Device,
    /// Dataset origin
    DataSource,
    /// Element type of input tensors
    Dtype,
    /// Workload granularity
    Granularity,
    /// Timing strategy
    Timer,
    /// Single operator identifier
    Operator,
    /// Model identifier
    Model,
}

impl Domain {
    /// All domains in declaration order
    pub const ALL: [Domain; 9] = [
        Domain::RunMode,
        Domain::Framework,
        Domain::Device,
        Domain::DataSource,
        Domain::Dtype,
        Domain::Granularity,
        Domain::Timer,
        Domain::Operator,
        Domain::Model,
    ];

    /// Snake-case domain name
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::RunMode => "run_mode",
            Domain::Framework => "framework",
            Domain::Device => "device",
            Domain::DataSource => "data_source",
            Domain::Dtype => "dtype",
            Domain::Granularity => "granularity",
            Domain::Timer => "timer",
            Domain::Operator => "operator",
            Domain::Model => "model",
        }
    }

    /// Built-in `(name, tag)` pairs, excluding `UNKNOWN`
    pub fn builtins(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Domain::RunMode => &[("INFERENCE", tags::INFERENCE), ("TRAINING", tags::TRAINING)],
            Domain::Framework => &[
                ("TORCH", tags::TORCH),
                ("TENSORFLOW", tags::TENSORFLOW),
                ("TVM", tags::TVM),
                ("IREE", tags::IREE),
                ("NATIVE", tags::NATIVE),
            ],
            Domain::Device => &[("CPU", tags::CPU), ("GPU", tags::GPU), ("TPU", tags::TPU)],
            Domain::DataSource => &[
                ("SYNTHETIC", tags::SYNTHETIC),
                ("CIFAR10", tags::CIFAR10),
                ("MNIST", tags::MNIST),
            ],
            Domain::Dtype => &[("FLOAT32", tags::FLOAT32), ("FLOAT16", tags::FLOAT16)],
            Domain::Granularity => &[
                ("OPERATOR", tags::OPERATOR),
                ("MODEL", tags::MODEL),
                ("FUSED_OPERATOR", tags::FUSED_OPERATOR),
            ],
            Domain::Timer => &[
                ("GENERIC", tags::GENERIC),
                ("EVENT", tags::EVENT),
                ("TORCH", tags::TORCH),
                ("TENSORFLOW", tags::TENSORFLOW),
                ("IREE", tags::IREE),
                ("TVM", tags::TVM),
            ],
            Domain::Operator => &[
                ("CONV2D", tags::CONV2D),
                ("FULLY_CONNECTED", tags::FULLY_CONNECTED),
                ("RELU", tags::RELU),
                ("BATCH_NORM", tags::BATCH_NORM),
                ("MAX_POOL", tags::MAX_POOL),
                ("AVG_POOL", tags::AVG_POOL),
                ("DROPOUT", tags::DROPOUT),
            ],
            Domain::Model => &[
                ("ALEXNET", tags::ALEXNET),
                ("RESNET18", tags::RESNET18),
                ("RESNET50", tags::RESNET50),
                ("RESNET152", tags::RESNET152),
                ("MOBILENET", tags::MOBILENET),
                ("BERT", tags::BERT),
                ("VGG16", tags::VGG16),
            ],
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in tags, for matching in builders
#[allow(missing_docs)]
pub mod tags {
    pub const INFERENCE: &str = "inference";
    pub const TRAINING: &str = "training";

    pub const TORCH: &str = "torch";
    pub const TENSORFLOW: &str = "tensorflow";
    pub const TVM: &str = "tvm";
    pub const IREE: &str = "iree";
    pub const NATIVE: &str = "native";

    pub const CPU: &str = "cpu";
    pub const GPU: &str = "gpu";
    pub const TPU: &str = "tpu";

    pub const SYNTHETIC: &str = "synthetic";
    pub const CIFAR10: &str = "cifar10";
    pub const MNIST: &str = "mnist";

    pub const FLOAT32: &str = "float32";
    pub const FLOAT16: &str = "float16";

    pub const OPERATOR: &str = "operator";
    pub const MODEL: &str = "model";
    pub const FUSED_OPERATOR: &str = "fused_operator";

    pub const GENERIC: &str = "generic";
    pub const EVENT: &str = "event";

    pub const CONV2D: &str = "conv2d";
    pub const FULLY_CONNECTED: &str = "fully_connected";
    pub const RELU: &str = "relu";
    pub const BATCH_NORM: &str = "batch_norm";
    pub const MAX_POOL: &str = "max_pool";
    pub const AVG_POOL: &str = "avg_pool";
    pub const DROPOUT: &str = "dropout";

    pub const ALEXNET: &str = "alexnet";
    pub const RESNET18: &str = "resnet18";
    pub const RESNET50: &str = "resnet50";
    pub const RESNET152: &str = "resnet152";
    pub const MOBILENET: &str = "mobilenet";
    pub const BERT: &str = "bert";
    pub const VGG16: &str = "vgg16";
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// One member of a categorical domain
///
/// Serialises as its tag, which is also the form accepted back by `decode`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoricalValue {
    domain: Domain,
    name: Arc<str>,
    tag: Arc<str>,
}

impl CategoricalValue {
    fn new(domain: Domain, name: &str, tag: &str) -> Self {
        Self {
            domain,
            name: Arc::from(name),
            tag: Arc::from(tag),
        }
    }

    /// Domain of this value
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Registered name, e.g. `CONV2D`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered tag, e.g. `conv2d`
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether this is the domain's fallback member
    pub fn is_unknown(&self) -> bool {
        &*self.tag == UNKNOWN_TAG
    }

    /// Whether the tag equals `tag`
    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }
}

impl fmt::Display for CategoricalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

impl Serialize for CategoricalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag)
    }
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct DomainTable {
    members: Vec<CategoricalValue>,
    by_name: FxHashMap<String, usize>,
    by_tag: FxHashMap<String, usize>,
}

impl DomainTable {
    fn insert(&mut self, value: CategoricalValue) {
        let idx = self.members.len();
        self.by_name.insert(value.name.to_lowercase(), idx);
        self.by_tag.insert(value.tag.to_lowercase(), idx);
        self.members.push(value);
    }

    fn lookup(&self, text: &str) -> Option<&CategoricalValue> {
        let key = text.trim().to_lowercase();
        self.by_tag
            .get(&key)
            .or_else(|| self.by_name.get(&key))
            .map(|&idx| &self.members[idx])
    }
}

/// Per-domain member tables
///
/// The process-wide instance is reached through the free functions of this
/// module; an owned registry is useful for isolated tests and tooling.
#[derive(Debug, Clone)]
pub struct CategoricalRegistry {
    tables: FxHashMap<Domain, DomainTable>,
}

impl CategoricalRegistry {
    /// Registry holding `UNKNOWN` plus the built-in members of every domain
    pub fn with_builtins() -> Self {
        let mut tables = FxHashMap::default();
        for domain in Domain::ALL {
            let mut table = DomainTable::default();
            table.insert(CategoricalValue::new(domain, UNKNOWN_NAME, UNKNOWN_TAG));
            for (name, tag) in domain.builtins() {
                table.insert(CategoricalValue::new(domain, name, tag));
            }
            tables.insert(domain, table);
        }
        Self { tables }
    }

    fn table(&self, domain: Domain) -> &DomainTable {
        // every domain is populated in `with_builtins`
        &self.tables[&domain]
    }

    /// Case-insensitive match on tag, then name; `UNKNOWN` when nothing matches
    pub fn decode(&self, domain: Domain, text: &str) -> CategoricalValue {
        self.table(domain)
            .lookup(text)
            .cloned()
            .unwrap_or_else(|| self.unknown(domain))
    }

    /// Exact lookup without the `UNKNOWN` fallback
    pub fn find(&self, domain: Domain, text: &str) -> Option<CategoricalValue> {
        self.table(domain).lookup(text).cloned()
    }

    /// Append a member; names and tags must be unique within the domain
    pub fn register(
        &mut self,
        domain: Domain,
        name: &str,
        tag: &str,
    ) -> Result<CategoricalValue, DuplicateDefinitionError> {
        let duplicate = |conflict| DuplicateDefinitionError {
            domain,
            name: name.to_string(),
            tag: tag.to_string(),
            conflict,
        };
        let table = self.tables.entry(domain).or_default();
        let (name_key, tag_key) = (name.to_lowercase(), tag.to_lowercase());
        // tags are matched before names, so a name shadowed by a tag is unreachable
        if table.by_name.contains_key(&name_key) || table.by_tag.contains_key(&name_key) {
            return Err(duplicate("name"));
        }
        if table.by_tag.contains_key(&tag_key) || table.by_name.contains_key(&tag_key) {
            return Err(duplicate("tag"));
        }
        let value = CategoricalValue::new(domain, name, tag);
        table.insert(value.clone());
        tracing::debug!(domain = %domain, name, tag, "registered categorical value");
        Ok(value)
    }

    /// Members of a domain in registration order, `UNKNOWN` first
    pub fn members(&self, domain: Domain) -> Vec<CategoricalValue> {
        self.table(domain).members.clone()
    }

    /// The domain's fallback member
    pub fn unknown(&self, domain: Domain) -> CategoricalValue {
        self.table(domain).members[0].clone()
    }
}

impl Default for CategoricalRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

static REGISTRY: OnceLock<RwLock<CategoricalRegistry>> = OnceLock::new();

fn global() -> &'static RwLock<CategoricalRegistry> {
    REGISTRY.get_or_init(|| RwLock::new(CategoricalRegistry::with_builtins()))
}

/// Decode against the process-wide registry
pub fn decode(domain: Domain, text: &str) -> CategoricalValue {
    let registry = global().read().unwrap_or_else(|e| e.into_inner());
    registry.decode(domain, text)
}

/// Lookup without fallback against the process-wide registry
pub fn find(domain: Domain, text: &str) -> Option<CategoricalValue> {
    let registry = global().read().unwrap_or_else(|e| e.into_inner());
    registry.find(domain, text)
}

/// Register into the process-wide registry
pub fn register(
    domain: Domain,
    name: &str,
    tag: &str,
) -> Result<CategoricalValue, DuplicateDefinitionError> {
    let mut registry = global().write().unwrap_or_else(|e| e.into_inner());
    registry.register(domain, name, tag)
}

/// Members of a domain in the process-wide registry
pub fn members(domain: Domain) -> Vec<CategoricalValue> {
    let registry = global().read().unwrap_or_else(|e| e.into_inner());
    registry.members(domain)
}

/// Fallback member of a domain
pub fn unknown(domain: Domain) -> CategoricalValue {
    let registry = global().read().unwrap_or_else(|e| e.into_inner());
    registry.unknown(domain)
}

// ─── Plugins ─────────────────────────────────────────────────────────────────

/// Categorical member contributed by a plugin crate
///
/// ```ignore
/// inventory::submit! {
///     quark_core::PluginDef { domain: Domain::Model, name: "SQUEEZENET", tag: "squeezenet" }
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PluginDef {
    /// Domain being extended
    pub domain: Domain,
    /// New member name
    pub name: &'static str,
    /// New member tag
    pub tag: &'static str,
}

inventory::collect!(PluginDef);

static PLUGIN_OUTCOME: OnceLock<Result<Vec<CategoricalValue>, DuplicateDefinitionError>> =
    OnceLock::new();

/// Append every submitted [`PluginDef`] to the process-wide registry
///
/// Runs once; later calls return the first outcome.
pub fn register_plugins() -> Result<Vec<CategoricalValue>, DuplicateDefinitionError> {
    PLUGIN_OUTCOME
        .get_or_init(|| {
            let mut defs: Vec<&PluginDef> = inventory::iter::<PluginDef>.into_iter().collect();
            defs.sort_by_key(|d| (d.domain, d.tag));
            let mut added = Vec::with_capacity(defs.len());
            for def in defs {
                added.push(register(def.domain, def.name, def.tag)?);
            }
            tracing::debug!(count = added.len(), "registered plugin definitions");
            Ok(added)
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_is_case_insensitive() {
        let registry = CategoricalRegistry::with_builtins();
        let a = registry.decode(Domain::Operator, "Conv2D");
        let b = registry.decode(Domain::Operator, "conv2d");
        let c = registry.decode(Domain::Operator, "CONV2D");
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.name(), "CONV2D");
        assert_eq!(a.tag(), "conv2d");
    }

    #[test]
    fn test_decode_falls_back_to_unknown() {
        let registry = CategoricalRegistry::with_builtins();
        let value = registry.decode(Domain::Device, "quantum");
        assert!(value.is_unknown());
        assert_eq!(value, registry.unknown(Domain::Device));
        assert_eq!(registry.find(Domain::Device, "quantum"), None);
    }

    #[test]
    fn test_unknown_exists_in_every_domain() {
        let registry = CategoricalRegistry::with_builtins();
        for domain in Domain::ALL {
            let members = registry.members(domain);
            assert_eq!(members[0].name(), UNKNOWN_NAME);
            assert_eq!(members.len(), domain.builtins().len() + 1);
        }
    }

    #[test]
    fn test_register_extends_domain() {
        let mut registry = CategoricalRegistry::with_builtins();
        let before = registry.members(Domain::Model).len();
        assert!(registry.decode(Domain::Model, "squeezenet").is_unknown());
        let value = registry
            .register(Domain::Model, "SQUEEZENET", "squeezenet")
            .unwrap();
        assert_eq!(registry.members(Domain::Model).len(), before + 1);
        assert_eq!(registry.decode(Domain::Model, "SqueezeNet"), value);
    }

    #[test]
    fn test_register_rejects_name_tag_cross_collision() {
        let mut registry = CategoricalRegistry::with_builtins();
        registry.register(Domain::Model, "SQUEEZE", "sq").unwrap();

        let err = registry.register(Domain::Model, "SQ", "squeeze_v2").unwrap_err();
        assert_eq!(err.conflict, "name");
        let err = registry.register(Domain::Model, "SQUEEZE_V3", "Squeeze").unwrap_err();
        assert_eq!(err.conflict, "tag");
        assert!(registry.find(Domain::Model, "squeeze_v2").is_none());
        assert!(registry.find(Domain::Model, "squeeze_v3").is_none());
        assert_eq!(registry.decode(Domain::Model, "sq").name(), "SQUEEZE");
    }

    #[test]
    fn test_register_duplicate_tag_fails() {
        let mut registry = CategoricalRegistry::with_builtins();
        let err = registry
            .register(Domain::Model, "RESNET_AGAIN", "resnet50")
            .unwrap_err();
        assert_eq!(err.conflict, "tag");

        let err = registry
            .register(Domain::Model, "resnet50", "something_else")
            .unwrap_err();
        assert_eq!(err.conflict, "name");
    }

    #[test]
    fn test_same_tag_in_different_domains() {
        let registry = CategoricalRegistry::with_builtins();
        let framework = registry.decode(Domain::Framework, "torch");
        let timer = registry.decode(Domain::Timer, "torch");
        assert_ne!(framework, timer);
        assert_eq!(framework.tag(), timer.tag());
    }

    #[test]
    fn test_serialises_as_tag() {
        let registry = CategoricalRegistry::with_builtins();
        let value = registry.decode(Domain::Dtype, "FLOAT32");
        assert_eq!(serde_json::to_string(&value).unwrap(), "\"float32\"");
    }
}
