//! Template registration and lookup through the public registry API.

use rstest::{fixture, rstest};
use scenarist::pattern::ParamValue;
use scenarist::registry::{RegistrationError, StepRegistry};
use scenarist::step::Phase;

#[fixture]
fn registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry
        .when(r#"I set replicas to {count:int} for deployment "{name:str}""#)
        .example(r#"I set replicas to 3 for deployment "my-app""#)
        .run(|_| Ok(()))
        .expect("register set replicas");
    registry
        .then(r#"deployment "{name}" should have {count:int} replicas"#)
        .run(|_| Ok(()))
        .expect("register verification");
    registry
}

#[rstest]
fn integer_and_string_placeholders_bind(registry: StepRegistry) {
    let bound = registry
        .find(Phase::When, r#"I set replicas to 3 for deployment "my-app""#)
        .expect("match");
    assert_eq!(bound.bindings().get("count"), Some(&ParamValue::Int(3)));
    assert_eq!(bound.bindings().str("name").expect("name"), "my-app");
}

#[rstest]
fn failed_integer_conversion_is_no_match(registry: StepRegistry) {
    let err = registry
        .find(Phase::When, r#"I set replicas to abc for deployment "my-app""#)
        .expect_err("no match");
    assert_eq!(err.phase, Phase::When);
    assert_eq!(
        err.to_string(),
        r#"no When step matches 'I set replicas to abc for deployment "my-app"'"#
    );
}

#[rstest]
fn lookup_is_scoped_to_the_phase(registry: StepRegistry) {
    let text = r#"deployment "web" should have 2 replicas"#;
    assert!(registry.find(Phase::Then, text).is_ok());
    assert!(registry.find(Phase::Given, text).is_err());
    assert!(registry.find(Phase::When, text).is_err());
}

#[rstest]
fn identical_skeletons_are_rejected(mut registry: StepRegistry) {
    let err = registry
        .when(r#"I set replicas to {n:int} for deployment "{target}""#)
        .run(|_| Ok(()))
        .expect_err("duplicate");
    assert!(matches!(err, RegistrationError::DuplicateTemplate { .. }), "{err:?}");
    assert_eq!(registry.len(), 2);
}

#[rstest]
fn same_text_in_another_phase_is_allowed(mut registry: StepRegistry) {
    registry
        .given(r#"I set replicas to {count:int} for deployment "{name}""#)
        .run(|_| Ok(()))
        .expect("different phase");
    assert_eq!(registry.phase(Phase::Given).len(), 1);
}

#[rstest]
fn overlapping_templates_resolve_to_the_first_registered() {
    let mut registry = StepRegistry::new();
    registry
        .then("pod {name} is ready")
        .run(|_| Ok(()))
        .expect("general");
    registry
        .then(r#"pod "{name}" is ready"#)
        .run(|_| Ok(()))
        .expect("specific");
    let bound = registry
        .find(Phase::Then, r#"pod "web-0" is ready"#)
        .expect("match");
    assert_eq!(bound.definition().template().as_str(), "pod {name} is ready");
}

#[rstest]
fn example_must_match_its_template() {
    let mut registry = StepRegistry::new();
    let err = registry
        .given(r#"namespace "{namespace}" exists"#)
        .example("namespace shop exists")
        .run(|_| Ok(()))
        .expect_err("example mismatch");
    assert!(matches!(err, RegistrationError::ExampleMismatch { .. }), "{err:?}");
    assert!(registry.is_empty());
}

#[rstest]
fn unknown_placeholder_type_is_rejected() {
    let mut registry = StepRegistry::new();
    let err = registry
        .given("wait {secs:duration}")
        .run(|_| Ok(()))
        .expect_err("invalid template");
    assert!(matches!(err, RegistrationError::InvalidTemplate(_)), "{err:?}");
}
