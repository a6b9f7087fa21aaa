//! Discovery sessions: enumerate the classes of a unit under test, expand
//! their test methods and report the resulting cases through a bus.
//!
//! Classes are processed on a rayon pool, one class per task, with methods
//! inside a class handled sequentially. Workers push into a bounded channel
//! and the session thread is the only caller of the bus.
mod loader;
mod rehydrate;
mod source_info;

pub use loader::UnitLoader;
pub use source_info::{SourceInformationProvider, SourceMap};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, error, info, trace, warn};

use crate::bus::{DiscoveredCase, DiscoveryEvent, DiscoverySink, ResultBus};
use crate::cancel::CancellationToken;
use crate::collection::CollectionResolver;
use crate::config::DiscoveryOptions;
use crate::error::ConfigurationError;
use crate::markers::{kinds, AttributeResolver, MarkerPayload, MarkerRegistry};
use crate::metadata::{MethodRef, SourceLocation, TestAssembly};
use crate::model::{TestCase, TestClass, TestMethod, Traits};
use crate::theory::{data::panic_message, DataSourceRegistry, Expansion, TheoryExpander};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Phases of a session, used in trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    Scanning,
    Resolving,
    Expanding,
    Reporting,
    Finished,
}

impl DiscoveryPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scanning => "scanning",
            Self::Resolving => "resolving",
            Self::Expanding => "expanding",
            Self::Reporting => "reporting",
            Self::Finished => "finished",
        }
    }
}

/// What to discover and how.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRequest {
    /// Restricts discovery to one type. Private methods are considered only
    /// in this mode.
    pub type_name: Option<String>,
    pub options: DiscoveryOptions,
}

impl DiscoveryRequest {
    pub fn new(options: DiscoveryOptions) -> Self {
        Self {
            type_name: None,
            options,
        }
    }

    pub fn for_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscoverySummary {
    pub case_count: usize,
    pub cancelled: bool,
    /// The bus asked to stop before discovery finished.
    pub stopped: bool,
}

enum WorkerMessage {
    Case(Box<DiscoveredCase>),
    Diagnostic(String),
}

struct DiscovererInner {
    attributes: AttributeResolver,
    expander: TheoryExpander,
    source_provider: Option<Arc<dyn SourceInformationProvider>>,
}

/// Runs discovery sessions. Cheap to clone; clones share resolvers and
/// registries.
#[derive(Clone)]
pub struct Discoverer {
    inner: Arc<DiscovererInner>,
}

#[derive(Default)]
pub struct DiscovererBuilder {
    registry: Option<MarkerRegistry>,
    data: DataSourceRegistry,
    source_provider: Option<Arc<dyn SourceInformationProvider>>,
}

impl DiscovererBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: MarkerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_data_sources(mut self, data: DataSourceRegistry) -> Self {
        self.data = data;
        self
    }

    pub fn with_source_provider(mut self, provider: Arc<dyn SourceInformationProvider>) -> Self {
        self.source_provider = Some(provider);
        self
    }

    pub fn build(self) -> Discoverer {
        let registry = Arc::new(self.registry.unwrap_or_default());
        let attributes = AttributeResolver::new(registry);
        let expander = TheoryExpander::new(attributes.clone(), Arc::new(self.data));
        Discoverer {
            inner: Arc::new(DiscovererInner {
                attributes,
                expander,
                source_provider: self.source_provider,
            }),
        }
    }
}

impl Default for Discoverer {
    fn default() -> Self {
        DiscovererBuilder::new().build()
    }
}

impl Discoverer {
    pub fn builder() -> DiscovererBuilder {
        DiscovererBuilder::new()
    }

    pub fn attributes(&self) -> &AttributeResolver {
        &self.inner.attributes
    }

    pub fn expander(&self) -> &TheoryExpander {
        &self.inner.expander
    }

    pub fn collections(&self, options: &DiscoveryOptions) -> CollectionResolver {
        CollectionResolver::new(self.inner.attributes.clone(), options.collection_behavior)
    }

    /// Runs one discovery session and reports every event through `bus`.
    ///
    /// `DiscoveryStarting` and `DiscoveryComplete` are always reported. On
    /// cancellation or a stop request, in-flight workers are not awaited;
    /// they see the cancelled session token or the closed channel and finish on their own.
    pub fn find<S: DiscoverySink>(
        &self,
        assembly: Arc<TestAssembly>,
        request: &DiscoveryRequest,
        bus: &ResultBus<S>,
        cancel: &CancellationToken,
    ) -> DiscoverySummary {
        info!(
            assembly = %assembly.name(),
            type_filter = ?request.type_name,
            collection_behavior = request.options.collection_behavior.as_str(),
            method_display = request.options.method_display.as_str(),
            "starting discovery"
        );
        let mut summary = DiscoverySummary::default();
        let starting = DiscoveryEvent::DiscoveryStarting {
            assembly: assembly.name().to_string(),
            assembly_id: assembly.unique_id().clone(),
        };
        summary.stopped = !bus.report(&starting);

        if !summary.stopped {
            trace!(phase = DiscoveryPhase::Scanning.as_str());
            match self.candidate_types(&assembly, request) {
                Ok(candidates) => self.run_workers(&assembly, candidates, request, bus, cancel, &mut summary),
                Err(message) => summary.stopped = !bus.report(&DiscoveryEvent::Diagnostic { message }),
            }
        }

        summary.cancelled = cancel.is_cancelled();
        bus.report(&DiscoveryEvent::DiscoveryComplete {
            assembly_id: assembly.unique_id().clone(),
            case_count: summary.case_count,
            cancelled: summary.cancelled,
        });
        trace!(phase = DiscoveryPhase::Finished.as_str());
        info!(
            assembly = %assembly.name(),
            cases = summary.case_count,
            cancelled = summary.cancelled,
            stopped = summary.stopped,
            "discovery complete"
        );
        summary
    }

    fn candidate_types(
        &self,
        assembly: &TestAssembly,
        request: &DiscoveryRequest,
    ) -> Result<Vec<usize>, String> {
        let indices: Vec<usize> = match &request.type_name {
            Some(name) => vec![assembly
                .type_index_of(name)
                .ok_or_else(|| format!("type '{name}' not found in '{}'", assembly.name()))?],
            None => (0..assembly.types().len()).collect(),
        };
        Ok(indices
            .into_iter()
            .filter(|&i| {
                let instantiable = assembly.type_at(i).is_instantiable();
                if !instantiable {
                    trace!(class = %assembly.type_at(i).name, "skipping non-instantiable type");
                }
                instantiable
            })
            .collect())
    }

    fn run_workers<S: DiscoverySink>(
        &self,
        assembly: &Arc<TestAssembly>,
        candidates: Vec<usize>,
        request: &DiscoveryRequest,
        bus: &ResultBus<S>,
        cancel: &CancellationToken,
        summary: &mut DiscoverySummary,
    ) {
        let options = &request.options;
        let (sender, receiver) = mpsc::sync_channel(options.channel_capacity.max(1));
        // Cancelled by the caller or when the bus asks to stop. Workers, data
        // cursors and providers only ever see this token.
        let session = cancel.child_token();

        let worker = {
            let inner = Arc::clone(&self.inner);
            let assembly = Arc::clone(assembly);
            let request = request.clone();
            let session = session.clone();
            let threads = options.worker_threads();
            thread::Builder::new()
                .name("casefinder-discovery".to_string())
                .spawn(move || inner.dispatch(&assembly, &candidates, &request, &session, threads, sender))
        };
        let worker = match worker {
            Ok(handle) => handle,
            Err(err) => {
                error!("failed to start discovery worker: {err}");
                summary.stopped = !bus.report(&DiscoveryEvent::Diagnostic {
                    message: format!("failed to start discovery worker: {err}"),
                });
                return;
            }
        };

        let mut finished = false;
        loop {
            if cancel.is_cancelled() {
                debug!("discovery cancelled");
                break;
            }
            let event = match receiver.recv_timeout(POLL_INTERVAL) {
                Ok(WorkerMessage::Case(case)) => {
                    summary.case_count += 1;
                    DiscoveryEvent::TestCaseDiscovered(*case)
                }
                Ok(WorkerMessage::Diagnostic(message)) => DiscoveryEvent::Diagnostic { message },
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    finished = true;
                    break;
                }
            };
            trace!(phase = DiscoveryPhase::Reporting.as_str(), event = event.as_str());
            if !bus.report(&event) {
                summary.stopped = true;
                break;
            }
        }

        session.cancel();
        drop(receiver);
        if finished {
            if worker.join().is_err() {
                warn!("discovery worker panicked");
            }
        } else {
            debug!("leaving in-flight workers to unwind");
        }
    }
}

impl DiscovererInner {
    fn dispatch(
        &self,
        assembly: &TestAssembly,
        candidates: &[usize],
        request: &DiscoveryRequest,
        cancel: &CancellationToken,
        threads: usize,
        sender: SyncSender<WorkerMessage>,
    ) {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("casefinder-worker-{i}"))
            .build()
        {
            Ok(pool) => pool,
            Err(err) => {
                let _ = sender.send(WorkerMessage::Diagnostic(format!(
                    "failed to build worker pool: {err}"
                )));
                return;
            }
        };
        debug!(threads, classes = candidates.len(), "dispatching classes");

        pool.install(|| {
            candidates.par_iter().for_each_with(sender, |sender, &type_index| {
                if cancel.is_cancelled() {
                    return;
                }
                let mut emit = |message: WorkerMessage| sender.send(message).is_ok();
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    self.discover_class(assembly, type_index, request, cancel, &mut emit)
                }));
                if let Err(panic) = outcome {
                    let class = &assembly.type_at(type_index).name;
                    let message = format!(
                        "unexpected fault discovering '{class}': {}",
                        panic_message(&*panic)
                    );
                    error!("{message}");
                    emit(WorkerMessage::Diagnostic(message));
                }
            });
        });
    }

    fn discover_class(
        &self,
        assembly: &TestAssembly,
        type_index: usize,
        request: &DiscoveryRequest,
        cancel: &CancellationToken,
        emit: &mut dyn FnMut(WorkerMessage) -> bool,
    ) {
        let options = &request.options;
        let type_info = assembly.type_at(type_index);
        trace!(phase = DiscoveryPhase::Resolving.as_str(), class = %type_info.name);

        let collections = CollectionResolver::new(self.attributes.clone(), options.collection_behavior);
        let prepared = collections.resolve(assembly, type_index).and_then(|collection| {
            let traits = self.type_traits(assembly, type_index)?;
            Ok((collection, traits))
        });
        let (collection, class_traits) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(class = %type_info.name, error = %err, "skipping class");
                emit(WorkerMessage::Diagnostic(format!(
                    "skipping class '{}': {err}",
                    type_info.name
                )));
                return;
            }
        };
        let class = Arc::new(TestClass::new(type_info.name.clone(), collection));
        let include_private = request.type_name.is_some();

        for method_ref in assembly.candidate_methods(type_index, include_private) {
            if cancel.is_cancelled() {
                return;
            }
            let info = assembly.method(method_ref);
            let method = Arc::new(TestMethod::new(info.name.clone(), Arc::clone(&class)));
            trace!(phase = DiscoveryPhase::Expanding.as_str(), method = %info.name);

            let expanded = self
                .expander
                .expand(assembly, method_ref, &method, options, cancel)
                .and_then(|expansion| {
                    let traits = self.method_traits(assembly, method_ref, &class_traits)?;
                    Ok((expansion, traits))
                });
            let (cases, traits) = match expanded {
                Ok((Expansion::Cases(cases), traits)) => (cases, traits),
                Ok((Expansion::Cancelled, _)) => return,
                Err(err) => {
                    warn!(class = %type_info.name, method = %info.name, error = %err, "skipping method");
                    if !emit(WorkerMessage::Diagnostic(format!(
                        "skipping method '{}.{}': {err}",
                        type_info.name, info.name
                    ))) {
                        return;
                    }
                    continue;
                }
            };

            let mut provider_source: Option<Option<SourceLocation>> = None;
            for case in cases {
                let case = self.enrich(case, assembly, method_ref, options, &traits, &mut provider_source);
                let discovered = DiscoveredCase::new(case, options.include_serialized_payload);
                if !emit(WorkerMessage::Case(Box::new(discovered))) {
                    return;
                }
            }
        }
    }

    /// Attaches traits and, when requested, source information. The provider
    /// is asked at most once per method and only for cases without metadata
    /// source information.
    fn enrich(
        &self,
        case: TestCase,
        assembly: &TestAssembly,
        method_ref: MethodRef,
        options: &DiscoveryOptions,
        traits: &Traits,
        provider_source: &mut Option<Option<SourceLocation>>,
    ) -> TestCase {
        let case = case.with_traits(traits.clone());
        if !options.include_source_info {
            return case;
        }
        if let Some(source) = &assembly.method(method_ref).source {
            return case.with_source(Some(source.clone()));
        }
        let Some(provider) = &self.source_provider else {
            return case;
        };
        let source = provider_source
            .get_or_insert_with(|| provider.lookup(case.type_name(), case.method_name()))
            .clone();
        case.with_source(source)
    }

    fn type_traits(
        &self,
        assembly: &TestAssembly,
        type_index: usize,
    ) -> Result<Traits, ConfigurationError> {
        let mut traits = Traits::new();
        let markers = self
            .attributes
            .resolve_type(assembly, type_index, kinds::TRAIT)?;
        add_traits(&mut traits, markers.iter().map(|m| &m.payload));
        Ok(traits)
    }

    fn method_traits(
        &self,
        assembly: &TestAssembly,
        method_ref: MethodRef,
        class_traits: &Traits,
    ) -> Result<Traits, ConfigurationError> {
        let mut traits = class_traits.clone();
        let markers = self
            .attributes
            .resolve_method(assembly, method_ref, kinds::TRAIT)?;
        add_traits(&mut traits, markers.iter().map(|m| &m.payload));
        Ok(traits)
    }
}

fn add_traits<'a>(traits: &mut Traits, payloads: impl Iterator<Item = &'a MarkerPayload>) {
    for payload in payloads {
        if let MarkerPayload::Trait { name, value } = payload {
            let values = traits.entry(name.clone()).or_default();
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::CollectingSink;
    use crate::metadata::{AssemblyDescription, MarkerUsage, MethodInfo, TypeInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl SourceInformationProvider for CountingProvider {
        fn lookup(&self, _type_name: &str, _method_name: &str) -> Option<SourceLocation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(SourceLocation::new("provided.cs", 7))
        }
    }

    fn fact(name: &str) -> MethodInfo {
        MethodInfo::new(name).with_marker(MarkerUsage::new(kinds::FACT))
    }

    fn assembly() -> Arc<TestAssembly> {
        let description = AssemblyDescription::new("Tests")
            .with_type(
                TypeInfo::new("Tests.Math")
                    .with_marker(
                        MarkerUsage::new(kinds::TRAIT)
                            .with_name("Category")
                            .with_value("Unit"),
                    )
                    .with_method(fact("Adds").with_source(SourceLocation::new("math.cs", 3)))
                    .with_method(fact("Subtracts"))
                    .with_method(fact("Hidden").private()),
            )
            .with_type(TypeInfo::new("Tests.Abstract").abstract_type().with_method(fact("Never")));
        Arc::new(TestAssembly::new(description).unwrap())
    }

    fn run(discoverer: &Discoverer, request: &DiscoveryRequest) -> (DiscoverySummary, Vec<TestCase>) {
        let sink = CollectingSink::new();
        let events = sink.handle();
        let bus = ResultBus::acquire(sink);
        let summary = discoverer.find(assembly(), request, &bus, &CancellationToken::new());
        (summary, events.cases())
    }

    #[test]
    fn test_abstract_types_and_private_methods_excluded() {
        let (summary, cases) = run(&Discoverer::default(), &DiscoveryRequest::default());
        assert_eq!(summary.case_count, 2);
        let mut names: Vec<_> = cases.iter().map(|c| c.method_name().to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["Adds", "Subtracts"]);
    }

    #[test]
    fn test_single_type_request_includes_private_methods() {
        let request = DiscoveryRequest::default().for_type("Tests.Math");
        let (summary, _) = run(&Discoverer::default(), &request);
        assert_eq!(summary.case_count, 3);
    }

    #[test]
    fn test_unknown_type_reports_diagnostic_and_completes() {
        let sink = CollectingSink::new();
        let events = sink.handle();
        let bus = ResultBus::acquire(sink);
        let request = DiscoveryRequest::default().for_type("Tests.Missing");
        let summary = Discoverer::default().find(assembly(), &request, &bus, &CancellationToken::new());
        assert_eq!(summary.case_count, 0);
        let names: Vec<_> = events.events().iter().map(|e| e.as_str()).collect();
        assert_eq!(
            names,
            vec!["discovery_starting", "diagnostic", "discovery_complete"]
        );
    }

    #[test]
    fn test_class_traits_attached() {
        let (_, cases) = run(&Discoverer::default(), &DiscoveryRequest::default());
        assert!(cases
            .iter()
            .all(|c| c.traits().get("Category") == Some(&vec!["Unit".to_string()])));
    }

    #[test]
    fn test_source_provider_called_only_when_missing() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let discoverer = Discoverer::builder()
            .with_source_provider(provider.clone())
            .build();
        let (_, cases) = run(&discoverer, &DiscoveryRequest::default());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let adds = cases.iter().find(|c| c.method_name() == "Adds").unwrap();
        assert_eq!(adds.source(), Some(&SourceLocation::new("math.cs", 3)));
        let subtracts = cases.iter().find(|c| c.method_name() == "Subtracts").unwrap();
        assert_eq!(subtracts.source(), Some(&SourceLocation::new("provided.cs", 7)));
    }

    #[test]
    fn test_source_info_not_requested() {
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let discoverer = Discoverer::builder()
            .with_source_provider(provider.clone())
            .build();
        let request = DiscoveryRequest::new(DiscoveryOptions {
            include_source_info: false,
            ..DiscoveryOptions::default()
        });
        let (_, cases) = run(&discoverer, &request);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(cases.iter().all(|c| c.source().is_none()));
    }

    #[test]
    fn test_cancelled_before_start_still_completes() {
        let sink = CollectingSink::new();
        let events = sink.handle();
        let bus = ResultBus::acquire(sink);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = Discoverer::default().find(assembly(), &DiscoveryRequest::default(), &bus, &cancel);
        assert!(summary.cancelled);
        let last = events.events().pop().unwrap();
        assert!(matches!(
            last,
            DiscoveryEvent::DiscoveryComplete { cancelled: true, .. }
        ));
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(DiscoveryPhase::Scanning.as_str(), "scanning");
        assert_eq!(DiscoveryPhase::Finished.as_str(), "finished");
    }
}
