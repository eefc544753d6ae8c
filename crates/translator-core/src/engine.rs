//! Traversal engine
//!
//! [`Translator::run`] walks a result graph and translates every declared
//! field it meets. Leaves are skipped, collections and map values are
//! visited in order, and records have their own translators applied before
//! their nested fields are visited.

use crate::cache::{CacheChain, CallCache, ChainStats, LocalCache, Locality, SharedCache};
use crate::error::DeclarationError;
use crate::field::cache_key;
use crate::graph::{Enrich, Node, RecordRef};
use crate::lookup::LookupSource;
use crate::param::Param;
use crate::query::{CompiledQuery, DictTemplates, FieldSpec, compile};
use crate::registry::Registry;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, trace};
use translator_common::{CacheBackendKind, TranslatorConfig};

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// State owned by one `run`
struct CallContext {
    scope: Option<CallCache>,
}

/// Builder for [`Translator`]
pub struct TranslatorBuilder {
    source: Arc<dyn LookupSource>,
    templates: DictTemplates,
    shared: Option<Arc<dyn SharedCache>>,
}

impl TranslatorBuilder {
    fn new(source: Arc<dyn LookupSource>) -> Self {
        Self {
            source,
            templates: DictTemplates::from(&TranslatorConfig::default()),
            shared: None,
        }
    }

    /// Dictionary query templates
    #[must_use]
    pub fn templates(mut self, templates: DictTemplates) -> Self {
        self.templates = templates;
        self
    }

    /// Shared cache consulted before the lookup source
    #[must_use]
    pub fn shared_cache(mut self, cache: Arc<dyn SharedCache>) -> Self {
        self.shared = Some(cache);
        self
    }

    #[must_use]
    pub fn build(self) -> Translator {
        Translator {
            registry: Registry::new(self.templates),
            chain: CacheChain::new(self.shared, self.source),
        }
    }
}

/// Display-value translator
pub struct Translator {
    registry: Registry,
    chain: CacheChain,
}

impl Translator {
    #[must_use]
    pub fn builder(source: Arc<dyn LookupSource>) -> TranslatorBuilder {
        TranslatorBuilder::new(source)
    }

    /// Translator with the templates and shared cache described by `config`
    #[must_use]
    pub fn from_config(config: &TranslatorConfig, source: Arc<dyn LookupSource>) -> Self {
        let builder = Self::builder(source).templates(DictTemplates::from(config));
        let builder = match config.cache.backend {
            CacheBackendKind::Local => {
                builder.shared_cache(Arc::new(LocalCache::from_config(&config.cache)))
            }
            CacheBackendKind::Disabled => builder,
        };
        builder.build()
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn stats(&self) -> &ChainStats {
        self.chain.stats()
    }

    /// Whether a `run` gets its own call-scoped cache. A process-local shared
    /// cache already answers repeated keys without a round trip.
    #[must_use]
    pub fn uses_call_scope(&self) -> bool {
        self.chain
            .shared()
            .is_none_or(|shared| shared.locality() != Locality::Local)
    }

    /// Translate every declared field reachable from `value`, in place.
    ///
    /// Never fails: fields that cannot be translated are left as they were
    /// and the reason is logged. A panic raised by a declared accessor or
    /// by `Record::declare` is caught, logged, and skips only that field or
    /// record.
    pub fn run(&self, value: &mut dyn Enrich) {
        let mut ctx = CallContext {
            scope: self.uses_call_scope().then(CallCache::new),
        };
        self.enrich(value, &mut ctx);
        if let Some(scope) = &ctx.scope {
            trace!(keys = scope.len(), "Discarding call-scoped cache");
        }
    }

    fn enrich(&self, value: &mut dyn Enrich, ctx: &mut CallContext) {
        match value.node() {
            Node::Leaf => {}
            Node::Many(children) => {
                for child in children {
                    self.enrich(child, ctx);
                }
            }
            Node::Record(record) => self.enrich_record(record, ctx),
        }
    }

    fn enrich_record(&self, record: RecordRef<'_>, ctx: &mut CallContext) {
        let RecordRef { descriptor, target } = record;
        let registered =
            panic::catch_unwind(AssertUnwindSafe(|| self.registry.ensure_registered(&descriptor)));
        let metadata = match registered {
            Ok(metadata) => metadata,
            Err(payload) => {
                error!(
                    type_name = descriptor.type_name(),
                    panic = panic_message(payload.as_ref()),
                    "Declaration panicked, record skipped"
                );
                return;
            }
        };

        for translator in metadata.translators() {
            let object: &mut dyn Any = &mut *target;
            let scope = ctx.scope.as_mut();
            let applied = panic::catch_unwind(AssertUnwindSafe(move || {
                translator.apply(object, &self.chain, scope);
            }));
            if let Err(payload) = applied {
                error!(
                    owner = translator.owner(),
                    field = translator.target(),
                    panic = panic_message(payload.as_ref()),
                    "Accessor panicked, field skipped"
                );
            }
        }

        for nested in metadata.nested() {
            let object: &mut dyn Any = &mut *target;
            match panic::catch_unwind(AssertUnwindSafe(move || {
                let object = object;
                nested.get(object)
            })) {
                Ok(Ok(child)) => self.enrich(child, ctx),
                Ok(Err(e)) => error!(
                    owner = nested.owner(),
                    field = nested.name(),
                    error = %e,
                    "Failed to read nested field"
                ),
                Err(payload) => error!(
                    owner = nested.owner(),
                    field = nested.name(),
                    panic = panic_message(payload.as_ref()),
                    "Nested field accessor panicked, field skipped"
                ),
            }
        }
    }

    /// Compile `spec` for `target` with this translator's dictionary
    /// templates, as registration would
    pub fn compile(
        &self,
        target: &str,
        spec: &FieldSpec,
    ) -> Result<CompiledQuery, DeclarationError> {
        compile(target, spec, self.registry.templates())
    }

    /// Resolve one set of association values through the cache chain
    /// outside of any record. Blank values resolve to `None` without a lookup.
    pub fn resolve(&self, query: &CompiledQuery, values: &[Param]) -> Option<String> {
        if values.is_empty() || values.iter().any(Param::is_blank) {
            return None;
        }
        let key = cache_key(&query.prefix, values);
        self.chain.resolve(&key, &query.sql, values, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cached;
    use crate::declare::{Declaration, Record};
    use crate::lookup::{MemoryFailure, MemoryLookup};
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    const STATUS: &str = "dict_display from dict_data where dict_code = 'ORDER_STATUS'";
    const STATUS_ENG: &str = "dict_eng_display from dict_data where dict_code = 'ORDER_STATUS'";
    const ITEM: &str = "dict_display from dict_data where dict_code = 'ITEM'";

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Order {
        status_code: Option<String>,
        status_name: Option<String>,
        lines: Vec<Line>,
    }

    impl Order {
        fn with_status(code: &str) -> Self {
            Self {
                status_code: Some(code.to_string()),
                ..Self::default()
            }
        }
    }

    impl Record for Order {
        fn declare(decl: &mut Declaration<Self>) {
            decl.read("status_code", |o| o.status_code.clone())
                .write("status_name", |o, v| o.status_name = Some(v))
                .translate(
                    "status_name",
                    FieldSpec::associated(["status_code"]).dict_code("ORDER_STATUS"),
                )
                .nested("lines", |o| &mut o.lines);
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Line {
        item_code: Option<String>,
        item_name: Option<String>,
    }

    impl Record for Line {
        fn declare(decl: &mut Declaration<Self>) {
            decl.read("item_code", |l| l.item_code.clone())
                .write("item_name", |l, v| l.item_name = Some(v))
                .translate("item_name", FieldSpec::associated(["item_code"]).dict_code("ITEM"));
        }
    }

    #[derive(Debug, Default)]
    struct Audited {
        creator_id: Option<i64>,
        creator_name: Option<String>,
    }

    impl Record for Audited {
        fn declare(decl: &mut Declaration<Self>) {
            decl.read("creator_id", |a| a.creator_id)
                .write("creator_name", |a, v| a.creator_name = Some(v))
                .translate(
                    "creator_name",
                    FieldSpec::associated(["creator_id"])
                        .sql("select name from users where id = ?")
                        .cache_key_prefix("user:"),
                );
        }
    }

    #[derive(Debug, Default)]
    struct Invoice {
        audit: Audited,
        status_code: Option<String>,
        status_en_name: Option<String>,
        country: Option<String>,
        region_code: Option<u32>,
        region_name: Option<String>,
    }

    impl Record for Invoice {
        fn declare(decl: &mut Declaration<Self>) {
            decl.extends(|i| &i.audit, |i| &mut i.audit)
                .read("status_code", |i| i.status_code.clone())
                .read("country", |i| i.country.clone())
                .read("region_code", |i| i.region_code)
                .write("status_en_name", |i, v| i.status_en_name = Some(v))
                .write("region_name", |i, v| i.region_name = Some(v))
                .translate(
                    "status_en_name",
                    FieldSpec::associated(["status_code"]).dict_code("ORDER_STATUS"),
                )
                .translate(
                    "region_name",
                    FieldSpec::associated(["country", "region_code"])
                        .sql("select label from {0} where country = ? and code = ?")
                        .template_params(["region"])
                        .cache_key_prefix("region:"),
                );
        }
    }

    #[derive(Debug, Default)]
    struct Catalog {
        lines: Vec<Line>,
    }

    impl Record for Catalog {
        fn declare(decl: &mut Declaration<Self>) {
            decl.nested("lines", |c| &mut c.lines);
        }
    }

    #[derive(Debug, Default)]
    struct Shipment {
        catalog: Catalog,
        status_code: Option<String>,
        status_name: Option<String>,
    }

    impl Record for Shipment {
        fn declare(decl: &mut Declaration<Self>) {
            decl.extends(|s| &s.catalog, |s| &mut s.catalog)
                .read("status_code", |s| s.status_code.clone())
                .write("status_name", |s, v| s.status_name = Some(v))
                .translate(
                    "status_name",
                    FieldSpec::associated(["status_code"]).dict_code("ORDER_STATUS"),
                );
        }
    }

    #[derive(Debug, Default)]
    struct Fragile {
        code: Option<String>,
        name: Option<String>,
        broken_name: Option<String>,
        lines: Vec<Line>,
    }

    impl Record for Fragile {
        fn declare(decl: &mut Declaration<Self>) {
            decl.read("code", |f| f.code.clone())
                .read::<Option<String>, _>("broken", |_| panic!("getter failure"))
                .write("name", |f, v| f.name = Some(v))
                .write("broken_name", |f, v| f.broken_name = Some(v))
                .translate(
                    "broken_name",
                    FieldSpec::associated(["broken"]).dict_code("ORDER_STATUS"),
                )
                .translate("name", FieldSpec::associated(["code"]).dict_code("ORDER_STATUS"))
                .nested::<Vec<Line>, _>("extra", |_| panic!("nested accessor failure"))
                .nested("lines", |f| &mut f.lines);
        }
    }

    struct Exploding;

    impl Record for Exploding {
        fn declare(_decl: &mut Declaration<Self>) {
            panic!("declaration failure");
        }
    }

    struct Bundle {
        first: Exploding,
        order: Order,
    }

    impl Record for Bundle {
        fn declare(decl: &mut Declaration<Self>) {
            decl.nested("first", |b| &mut b.first)
                .nested("order", |b| &mut b.order);
        }
    }

    /// Shared cache with a configurable locality that counts reads
    struct CountingCache {
        locality: Locality,
        entries: Mutex<HashMap<String, Cached>>,
        gets: AtomicU64,
    }

    impl CountingCache {
        fn new(locality: Locality) -> Self {
            Self {
                locality,
                entries: Mutex::new(HashMap::new()),
                gets: AtomicU64::new(0),
            }
        }
    }

    impl SharedCache for CountingCache {
        fn name(&self) -> &str {
            "counting"
        }

        fn get(&self, key: &str) -> Option<Cached> {
            self.gets.fetch_add(1, Ordering::Relaxed);
            self.entries.lock().get(key).cloned()
        }

        fn put(&self, key: &str, value: Cached) {
            self.entries.lock().insert(key.to_string(), value);
        }

        fn locality(&self) -> Locality {
            self.locality
        }
    }

    fn lookup() -> Arc<MemoryLookup> {
        let lookup = MemoryLookup::new();
        lookup.insert(STATUS, ["A"], Some("Active"));
        lookup.insert(STATUS, ["C"], Some("Closed"));
        lookup.insert(STATUS_ENG, ["A"], Some("Active (en)"));
        lookup.insert(ITEM, ["P1"], Some("Pencil"));
        lookup.insert(ITEM, ["P2"], Some("Paper"));
        lookup.insert("from users", ["7"], Some("alice"));
        lookup.insert("from region", ["CN", "31"], Some("Shanghai"));
        Arc::new(lookup)
    }

    fn local_translator(lookup: &Arc<MemoryLookup>) -> Translator {
        Translator::builder(lookup.clone())
            .shared_cache(Arc::new(LocalCache::new(16, 256, Duration::from_secs(60))))
            .build()
    }

    fn uncached_translator(lookup: &Arc<MemoryLookup>) -> Translator {
        Translator::builder(lookup.clone()).build()
    }

    #[test]
    fn test_order_status_resolved_once() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let mut first = Order::with_status("A");
        translator.run(&mut first);
        assert_eq!(first.status_name.as_deref(), Some("Active"));
        assert_eq!(lookup.queries(), 1);

        let mut second = Order::with_status("A");
        translator.run(&mut second);
        assert_eq!(second.status_name.as_deref(), Some("Active"));
        assert_eq!(lookup.queries(), 1);
    }

    #[test]
    fn test_run_is_idempotent() {
        let lookup = lookup();
        let translator = uncached_translator(&lookup);

        let mut order = Order::with_status("C");
        translator.run(&mut order);
        let once = order.clone();
        translator.run(&mut order);
        assert_eq!(order, once);
        assert_eq!(order.status_name.as_deref(), Some("Closed"));
    }

    #[test]
    fn test_one_lookup_per_key_per_run() {
        let lookup = lookup();
        let translator = uncached_translator(&lookup);
        assert!(translator.uses_call_scope());

        let mut orders = vec![Order::with_status("A"); 3];
        translator.run(&mut orders);
        assert!(orders.iter().all(|o| o.status_name.as_deref() == Some("Active")));
        assert_eq!(lookup.queries(), 1);

        // the call scope does not outlive the run
        translator.run(&mut orders);
        assert_eq!(lookup.queries(), 2);
    }

    #[test]
    fn test_missing_value_is_not_requeried() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let mut first = Order::with_status("Z");
        translator.run(&mut first);
        let mut second = Order::with_status("Z");
        translator.run(&mut second);

        assert_eq!(first.status_name, None);
        assert_eq!(second.status_name, None);
        assert_eq!(lookup.queries(), 1);
        assert_eq!(translator.stats().negative_hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_blank_association_leaves_target_untouched() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let mut orders: Vec<Order> = [None, Some(""), Some("   ")]
            .into_iter()
            .map(|code| Order {
                status_code: code.map(str::to_string),
                status_name: Some("keep".into()),
                lines: Vec::new(),
            })
            .collect();
        translator.run(&mut orders);

        assert!(orders.iter().all(|o| o.status_name.as_deref() == Some("keep")));
        assert_eq!(lookup.queries(), 0);
    }

    #[test]
    fn test_inherited_and_own_fields() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let mut invoice = Invoice {
            audit: Audited {
                creator_id: Some(7),
                creator_name: None,
            },
            status_code: Some("A".into()),
            country: Some("CN".into()),
            region_code: Some(31),
            ..Invoice::default()
        };
        translator.run(&mut invoice);

        assert_eq!(invoice.status_en_name.as_deref(), Some("Active (en)"));
        assert_eq!(invoice.region_name.as_deref(), Some("Shanghai"));
        assert_eq!(invoice.audit.creator_name.as_deref(), Some("alice"));
        assert!(translator.registry().is_registered::<Audited>());
    }

    #[test]
    fn test_inherited_nested_fields_are_walked() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let line = |code: &str| Line {
            item_code: Some(code.to_string()),
            item_name: None,
        };
        let mut shipment = Shipment {
            catalog: Catalog {
                lines: vec![line("P1"), line("P2")],
            },
            status_code: Some("C".into()),
            status_name: None,
        };
        translator.run(&mut shipment);

        assert_eq!(shipment.status_name.as_deref(), Some("Closed"));
        assert_eq!(shipment.catalog.lines[0].item_name.as_deref(), Some("Pencil"));
        assert_eq!(shipment.catalog.lines[1].item_name.as_deref(), Some("Paper"));

        let metadata = translator.registry().metadata::<Shipment>().unwrap();
        assert_eq!(metadata.nested().len(), 1);
        assert_eq!(metadata.nested()[0].owner(), std::any::type_name::<Catalog>());
    }

    #[test]
    fn test_panicking_accessors_skip_only_their_field() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let mut items = vec![
            Fragile {
                code: Some("A".into()),
                lines: vec![Line {
                    item_code: Some("P1".into()),
                    item_name: None,
                }],
                ..Fragile::default()
            },
            Fragile {
                code: Some("C".into()),
                ..Fragile::default()
            },
        ];
        translator.run(&mut items);

        assert_eq!(items[0].broken_name, None);
        assert_eq!(items[0].name.as_deref(), Some("Active"));
        assert_eq!(items[0].lines[0].item_name.as_deref(), Some("Pencil"));
        assert_eq!(items[1].name.as_deref(), Some("Closed"));
    }

    #[test]
    fn test_panicking_declaration_skips_record() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let mut bundle = Bundle {
            first: Exploding,
            order: Order::with_status("A"),
        };
        translator.run(&mut bundle);

        assert_eq!(bundle.order.status_name.as_deref(), Some("Active"));
        assert!(!translator.registry().is_registered::<Exploding>());
    }

    #[test]
    fn test_one_missing_association_skips_field() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let mut invoice = Invoice {
            country: Some("CN".into()),
            ..Invoice::default()
        };
        translator.run(&mut invoice);
        assert_eq!(invoice.region_name, None);
        assert_eq!(lookup.queries(), 0);
    }

    #[test]
    fn test_containers() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let mut by_id: HashMap<u32, Order> = HashMap::new();
        by_id.insert(1, Order::with_status("A"));
        by_id.insert(2, Order::with_status("C"));
        translator.run(&mut by_id);
        assert_eq!(by_id[&1].status_name.as_deref(), Some("Active"));
        assert_eq!(by_id[&2].status_name.as_deref(), Some("Closed"));

        let mut sparse = vec![None, Some(Order::with_status("A"))];
        translator.run(&mut sparse);
        assert_eq!(sparse[1].as_ref().and_then(|o| o.status_name.as_deref()), Some("Active"));

        let mut nested: BTreeMap<String, Vec<Order>> = BTreeMap::new();
        nested.insert("open".into(), vec![Order::with_status("C")]);
        translator.run(&mut nested);
        assert_eq!(nested["open"][0].status_name.as_deref(), Some("Closed"));

        let mut empty: Vec<Order> = Vec::new();
        translator.run(&mut empty);
        let mut none: Option<Order> = None;
        translator.run(&mut none);
        let mut scalar = 42_i64;
        translator.run(&mut scalar);
        assert_eq!(scalar, 42);
    }

    #[test]
    fn test_nested_records_follow_owner() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let mut order = Order::with_status("A");
        order.lines = vec![
            Line {
                item_code: Some("P1".into()),
                item_name: None,
            },
            Line {
                item_code: Some("P2".into()),
                item_name: None,
            },
        ];
        translator.run(&mut order);

        assert_eq!(order.status_name.as_deref(), Some("Active"));
        assert_eq!(order.lines[0].item_name.as_deref(), Some("Pencil"));
        assert_eq!(order.lines[1].item_name.as_deref(), Some("Paper"));
    }

    #[test]
    fn test_distributed_cache_gets_call_scope() {
        let lookup = lookup();
        let shared = Arc::new(CountingCache::new(Locality::Distributed));
        let translator = Translator::builder(lookup.clone())
            .shared_cache(shared.clone())
            .build();
        assert!(translator.uses_call_scope());

        let mut orders = vec![Order::with_status("A"); 3];
        translator.run(&mut orders);
        assert_eq!(shared.gets.load(Ordering::Relaxed), 1);
        assert_eq!(lookup.queries(), 1);
    }

    #[test]
    fn test_local_cache_has_no_call_scope() {
        let lookup = lookup();
        let shared = Arc::new(CountingCache::new(Locality::Local));
        let translator = Translator::builder(lookup.clone())
            .shared_cache(shared.clone())
            .build();
        assert!(!translator.uses_call_scope());

        let mut orders = vec![Order::with_status("A"); 3];
        translator.run(&mut orders);
        assert_eq!(shared.gets.load(Ordering::Relaxed), 3);
        assert_eq!(lookup.queries(), 1);
    }

    #[test]
    fn test_lookup_failure_leaves_target_unset() {
        let lookup = lookup();
        lookup.set_failure(Some(MemoryFailure::Connect));
        let translator = uncached_translator(&lookup);

        let mut order = Order::with_status("A");
        order.lines.push(Line {
            item_code: Some("P1".into()),
            item_name: None,
        });
        translator.run(&mut order);

        assert_eq!(order.status_name, None);
        assert_eq!(order.lines[0].item_name, None);
        assert_eq!(lookup.open_connections(), 0);
    }

    #[test]
    fn test_from_config() {
        let lookup = lookup();
        let mut config = TranslatorConfig::default();
        assert!(!Translator::from_config(&config, lookup.clone()).uses_call_scope());

        config.cache.backend = CacheBackendKind::Disabled;
        let translator = Translator::from_config(&config, lookup.clone());
        assert!(translator.uses_call_scope());

        let mut order = Order::with_status("A");
        translator.run(&mut order);
        assert_eq!(order.status_name.as_deref(), Some("Active"));
    }

    #[test]
    fn test_resolve_outside_records() {
        let lookup = lookup();
        let translator = local_translator(&lookup);

        let query = translator
            .compile(
                "status_en_name",
                &FieldSpec::associated(["value"]).dict_code("ORDER_STATUS"),
            )
            .unwrap();
        assert_eq!(query.prefix, "dict:eng:ORDER_STATUS:");
        assert_eq!(
            translator.resolve(&query, &[Param::Text("A".into())]).as_deref(),
            Some("Active (en)")
        );
        assert_eq!(translator.resolve(&query, &[Param::Text(" ".into())]), None);
        assert_eq!(lookup.queries(), 1);
    }

    #[test]
    fn test_concurrent_runs() {
        let lookup = lookup();
        let translator = Arc::new(local_translator(&lookup));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let translator = Arc::clone(&translator);
                std::thread::spawn(move || {
                    let code = if i % 2 == 0 { "A" } else { "C" };
                    let mut orders = vec![Order::with_status(code); 4];
                    translator.run(&mut orders);
                    orders
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let expected = if i % 2 == 0 { "Active" } else { "Closed" };
            let orders = handle.join().unwrap();
            assert!(orders.iter().all(|o| o.status_name.as_deref() == Some(expected)));
        }
        assert_eq!(translator.registry().len(), 1);
    }
}
