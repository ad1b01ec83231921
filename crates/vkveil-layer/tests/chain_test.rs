//! Validator chain: hook ordering around the forwarded call,
//! stop-on-first-error versus permissive reporting, and runtime release.

mod common;

use ash::vk;

use common::{boot, two_validator_settings, MockDriver, RecordingFactory};
use vkveil_core::{LayerSettings, ValidatorTag};
use vkveil_layer::types::RenderPassCreateInfo;
use vkveil_layer::Chassis;

#[test]
fn hooks_run_in_phase_then_attach_order() {
    let (factory, events) = RecordingFactory::new();
    let chassis = Chassis::new(two_validator_settings(), factory);
    let driver = MockDriver::with_events(events.clone());
    let (_instance, _pd, device) = boot(&chassis, driver);
    events.lock().clear();

    chassis
        .create_render_pass(device, &RenderPassCreateInfo::default())
        .unwrap();

    let render_pass_events: Vec<String> = events
        .lock()
        .iter()
        .filter(|e| e.ends_with("create_render_pass"))
        .cloned()
        .collect();
    assert_eq!(
        render_pass_events,
        vec![
            "Threading:validate:create_render_pass",
            "CoreValidation:validate:create_render_pass",
            "Threading:record_pre:create_render_pass",
            "CoreValidation:record_pre:create_render_pass",
            "driver:create_render_pass",
            "Threading:record_post:create_render_pass",
            "CoreValidation:record_post:create_render_pass",
        ]
    );
}

#[test]
fn stop_on_first_error_aborts_before_forwarding() {
    let (factory, events) = RecordingFactory::failing(vec![ValidatorTag::Threading]);
    let settings = LayerSettings {
        stop_on_first_error: true,
        ..two_validator_settings()
    };
    let chassis = Chassis::new(settings, factory);
    let driver = MockDriver::new();
    let (_instance, _pd, device) = boot(&chassis, driver.clone());
    events.lock().clear();

    let result = chassis.create_render_pass(device, &RenderPassCreateInfo::default());
    assert_eq!(result.unwrap_err(), vk::Result::ERROR_VALIDATION_FAILED_EXT);
    assert_eq!(driver.call_count("create_render_pass"), 0);

    // The walk stopped at the first failing validator.
    let validate_events: Vec<String> = events
        .lock()
        .iter()
        .filter(|e| e.contains(":validate:"))
        .cloned()
        .collect();
    assert_eq!(validate_events, vec!["Threading:validate:create_render_pass"]);
}

#[test]
fn permissive_mode_reports_everyone_and_still_forwards() {
    let (factory, events) = RecordingFactory::failing(vec![ValidatorTag::Threading]);
    let settings = LayerSettings {
        stop_on_first_error: false,
        ..two_validator_settings()
    };
    let chassis = Chassis::new(settings, factory);
    let driver = MockDriver::new();
    let (_instance, _pd, device) = boot(&chassis, driver.clone());
    events.lock().clear();

    let result = chassis.create_render_pass(device, &RenderPassCreateInfo::default());
    assert!(result.is_ok());
    assert_eq!(driver.call_count("create_render_pass"), 1);

    let validate_events: Vec<String> = events
        .lock()
        .iter()
        .filter(|e| e.contains(":validate:"))
        .cloned()
        .collect();
    assert_eq!(
        validate_events,
        vec![
            "Threading:validate:create_render_pass",
            "CoreValidation:validate:create_render_pass",
        ]
    );
}

#[test]
fn released_validator_stops_receiving_hooks() {
    let (factory, events) = RecordingFactory::new();
    let chassis = Chassis::new(two_validator_settings(), factory);
    let driver = MockDriver::new();
    let (_instance, _pd, device) = boot(&chassis, driver);
    let ctx = chassis.device_context(device).unwrap();

    assert!(ctx.validators.release(ValidatorTag::Threading));
    assert_eq!(ctx.validators.attached_len(), 1);
    assert_eq!(ctx.validators.retired_len(), 1);
    events.lock().clear();

    chassis
        .create_render_pass(device, &RenderPassCreateInfo::default())
        .unwrap();
    assert!(events
        .lock()
        .iter()
        .all(|e| !e.starts_with("Threading:")));
    assert!(events
        .lock()
        .iter()
        .any(|e| e.starts_with("CoreValidation:")));
}

#[test]
fn release_of_absent_tag_is_false() {
    let (factory, _events) = RecordingFactory::new();
    let chassis = Chassis::new(two_validator_settings(), factory);
    let driver = MockDriver::new();
    let (_instance, _pd, device) = boot(&chassis, driver);
    let ctx = chassis.device_context(device).unwrap();

    assert!(!ctx.validators.release(ValidatorTag::GpuAssisted));
    // Releasing the same tag twice retires it once.
    assert!(ctx.validators.release(ValidatorTag::CoreValidation));
    assert!(!ctx.validators.release(ValidatorTag::CoreValidation));
    assert_eq!(ctx.validators.retired_len(), 1);
}

#[test]
fn retired_validators_reclaimed_at_teardown() {
    let (factory, _events) = RecordingFactory::new();
    let chassis = Chassis::new(two_validator_settings(), factory);
    let driver = MockDriver::new();
    let (_instance, _pd, device) = boot(&chassis, driver);
    let ctx = chassis.device_context(device).unwrap();

    ctx.validators.release(ValidatorTag::Threading);
    assert_eq!(ctx.validators.retired_len(), 1);

    chassis.destroy_device(device);
    assert_eq!(ctx.validators.attached_len(), 0);
    assert_eq!(ctx.validators.retired_len(), 0);
}
