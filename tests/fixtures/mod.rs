#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use casefinder::bus::{CollectedEvents, CollectingSink, ResultBus};
use casefinder::discovery::{Discoverer, DiscoveryRequest, DiscoverySummary, UnitLoader};
use casefinder::markers::kinds;
use casefinder::metadata::{MarkerUsage, MethodInfo, TestAssembly, TypeRef};
use casefinder::{CancellationToken, TestCase};

pub fn get_test_fixture_path(fixture_name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("units")
        .join(fixture_name)
}

pub fn calculator() -> Arc<TestAssembly> {
    let mut assemblies = UnitLoader::new()
        .load(&get_test_fixture_path("calculator.unit.yaml"))
        .expect("calculator fixture should load");
    Arc::new(assemblies.remove(0))
}

pub fn fact(name: &str) -> MethodInfo {
    MethodInfo::new(name).with_marker(MarkerUsage::new(kinds::FACT))
}

pub fn theory(name: &str, parameter: &str, ty: &str) -> MethodInfo {
    MethodInfo::new(name)
        .with_parameter(parameter, TypeRef::named(ty))
        .with_marker(MarkerUsage::new(kinds::THEORY))
}

/// Runs one session into a collecting sink.
pub fn discover(
    discoverer: &Discoverer,
    assembly: Arc<TestAssembly>,
    request: &DiscoveryRequest,
    sink: CollectingSink,
    cancel: &CancellationToken,
) -> (DiscoverySummary, CollectedEvents) {
    let events = sink.handle();
    let bus = ResultBus::acquire(sink);
    let summary = discoverer.find(assembly, request, &bus, cancel);
    bus.shutdown();
    (summary, events)
}

pub fn discover_all(assembly: Arc<TestAssembly>, request: &DiscoveryRequest) -> Vec<TestCase> {
    let (_, events) = discover(
        &Discoverer::default(),
        assembly,
        request,
        CollectingSink::new(),
        &CancellationToken::new(),
    );
    events.cases()
}

pub fn find_case<'a>(cases: &'a [TestCase], display_name: &str) -> &'a TestCase {
    cases
        .iter()
        .find(|c| c.display_name() == display_name)
        .unwrap_or_else(|| panic!("no case named '{display_name}'"))
}
