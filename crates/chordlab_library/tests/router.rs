use chordlab_library::bindings::BindingStore;
use chordlab_library::controls::{LogicalControl, ParamKey, PhysicalBinding};
use chordlab_library::encoder::EncoderMode;
use chordlab_library::lights::DEFAULT_PAD_LED_BASE;
use chordlab_library::params::{ENCODER_SENSITIVITY, Origin};
use chordlab_library::persistence::MemoryStore;
use chordlab_library::router::{ControlRouter, Routed};

fn router() -> (ControlRouter, MemoryStore) {
    let handle = MemoryStore::new();
    let store = BindingStore::load(Box::new(handle.clone()));
    (ControlRouter::new(store, DEFAULT_PAD_LED_BASE), handle)
}

fn is_cc_frame(frame: &[u8]) -> bool {
    frame.len() == 3 && frame[0] & 0xF0 == 0xB0
}

fn is_oled_frame(frame: &[u8]) -> bool {
    frame.len() == 43 && frame[0] == 0xF0 && frame[8] == 0x60
}

#[test]
fn pad_press_activates_and_lights() {
    let (mut router, _) = router();
    let out = router.handle_frame(&[0x98, 38, 100], 0).unwrap();
    assert_eq!(out.routed, Routed::PadTriggered { pad: 2, velocity: 100 });
    assert_eq!(router.active_pad(), Some(2));
    assert!(!out.feedback.is_empty());
    assert!(out.feedback.iter().all(|f| f[0] == 0xF0 && f[8] == 0x16));

    // Only the two pads whose colour changed are re-sent on the next press.
    let out = router.handle_frame(&[0x98, 39, 90], 0).unwrap();
    let led_ids: Vec<u8> = out.feedback.iter().map(|f| f[9]).collect();
    assert_eq!(led_ids, vec![DEFAULT_PAD_LED_BASE + 2, DEFAULT_PAD_LED_BASE + 3]);
}

#[test]
fn pad_release_is_inert() {
    let (mut router, _) = router();
    router.handle_frame(&[0x98, 36, 100], 0);
    let out = router.handle_frame(&[0x88, 36, 0], 0).unwrap();
    assert_eq!(out.routed, Routed::PadReleased { pad: 0 });
    assert!(out.feedback.is_empty());
    assert_eq!(router.active_pad(), Some(0));
}

#[test]
fn unbound_and_non_control_traffic() {
    let (mut router, _) = router();
    let out = router.handle_frame(&[0xB0, 1, 64], 0).unwrap();
    assert!(matches!(out.routed, Routed::Unmatched(_)));
    assert!(out.feedback.is_empty());
    assert!(router.handle_frame(&[0xF0, 0x7E, 0xF7], 0).is_none());
    assert!(router.handle_frame(&[0xF8], 0).is_none());
}

#[test]
fn hardware_slider_update_does_not_echo() {
    let (mut router, _) = router();
    let out = router.handle_frame(&[0xB0, 14, 127], 0).unwrap();
    match out.routed {
        Routed::Parameter(change) => {
            assert_eq!(change.key, ParamKey::Complexity);
            assert_eq!(change.value, 1.0);
            assert_eq!(change.origin, Origin::Hardware);
        }
        other => panic!("expected parameter change, got {other:?}"),
    }
    assert!(out.feedback.iter().any(|f| is_oled_frame(f)));
    assert!(!out.feedback.iter().any(|f| is_cc_frame(f)));
}

#[test]
fn user_update_echoes_to_slider() {
    let (mut router, _) = router();
    let out = router.set_parameter(ParamKey::Spread, 0.5, Origin::User);
    assert!(matches!(out.routed, Routed::Parameter(_)));
    assert!(out.feedback.contains(&vec![0xB0, 15, 64]));

    let out = router.set_parameter(ParamKey::Spread, 0.25, Origin::Hardware);
    assert!(!out.feedback.iter().any(|f| is_cc_frame(f)));
}

#[test]
fn slider_hysteresis_through_router() {
    let (mut router, _) = router();
    // 1/3 stop
    router.handle_frame(&[0xB0, 14, 42], 0);
    assert_eq!(router.params().get(ParamKey::Complexity), 1.0 / 3.0);
    // 0.52 is past the midpoint but inside the hysteresis margin
    let out = router.handle_frame(&[0xB0, 14, 66], 0).unwrap();
    assert_eq!(out.routed, Routed::Unchanged(LogicalControl::Slider(ParamKey::Complexity)));
    // 0.58 clears it
    router.handle_frame(&[0xB0, 14, 74], 0);
    assert_eq!(router.params().get(ParamKey::Complexity), 2.0 / 3.0);
}

#[test]
fn one_step_encoder_nudges_target() {
    let (mut router, _) = router();
    for _ in 0..5 {
        router.handle_frame(&[0xB0, 87, 1], 0);
    }
    let spread = router.params().get(ParamKey::Spread);
    assert!((spread - 5.0 * ENCODER_SENSITIVITY).abs() < 1e-5);

    router.handle_frame(&[0xB0, 87, 127], 0);
    let spread = router.params().get(ParamKey::Spread);
    assert!((spread - 4.0 * ENCODER_SENSITIVITY).abs() < 1e-5);
    assert_eq!(router.encoder_mode(87), Some(EncoderMode::OneStep));
}

#[test]
fn untargeted_encoder_changes_nothing() {
    let (mut router, _) = router();
    let out = router.handle_frame(&[0xB0, 117, 1], 0).unwrap();
    assert_eq!(out.routed, Routed::Unchanged(LogicalControl::Encoder(117)));

    router.set_encoder_target(117, Some(ParamKey::Spread));
    let out = router.handle_frame(&[0xB0, 117, 1], 0).unwrap();
    assert!(matches!(out.routed, Routed::Parameter(_)));
}

#[test]
fn learn_consumes_event_and_rebinds() {
    let (mut router, handle) = router();
    router.arm_learn(LogicalControl::Pad(2));
    let out = router.handle_frame(&[0x90, 60, 100], 0).unwrap();
    assert_eq!(
        out.routed,
        Routed::Learned {
            control: LogicalControl::Pad(2),
            binding: PhysicalBinding::note(0, 60),
        }
    );
    assert_eq!(router.active_pad(), None);
    assert_eq!(router.learning(), None);

    let out = router.handle_frame(&[0x90, 60, 100], 0).unwrap();
    assert_eq!(out.routed, Routed::PadTriggered { pad: 2, velocity: 100 });
    assert!(handle.overrides().unwrap().contains_key(&LogicalControl::Pad(2)));
}

#[test]
fn learn_ignores_events_of_the_wrong_kind() {
    let (mut router, _) = router();
    router.arm_learn(LogicalControl::Slider(ParamKey::Spread));
    let out = router.handle_frame(&[0x90, 60, 100], 0).unwrap();
    assert!(matches!(out.routed, Routed::Unmatched(_)));
    assert_eq!(router.learning(), Some(LogicalControl::Slider(ParamKey::Spread)));

    router.disarm_learn();
    assert_eq!(router.learning(), None);
}

#[test]
fn encoder_relearn_keeps_target_and_restarts_inference() {
    let (mut router, _) = router();
    for _ in 0..6 {
        router.handle_frame(&[0xB0, 86, 1], 0);
    }
    assert_eq!(router.encoder_mode(86), Some(EncoderMode::OneStep));

    router.arm_learn(LogicalControl::Encoder(86));
    let out = router.handle_frame(&[0xB1, 21, 64], 0).unwrap();
    match out.routed {
        Routed::Learned { binding, .. } => {
            assert_eq!(binding, PhysicalBinding::encoder(1, 21, Some(ParamKey::Complexity)));
        }
        other => panic!("expected learn, got {other:?}"),
    }
    assert_eq!(router.encoder_mode(86), None);
    assert_eq!(router.encoder_mode(21), None);
    assert!(matches!(router.handle_frame(&[0xB0, 86, 1], 0).unwrap().routed, Routed::Unmatched(_)));
}

#[test]
fn pinned_encoder_mode_skips_inference() {
    let (mut router, handle) = router();
    router
        .set_encoder_mode(LogicalControl::Encoder(87), Some(EncoderMode::SignMagnitude))
        .unwrap();
    assert_eq!(router.encoder_mode(87), Some(EncoderMode::SignMagnitude));
    assert_eq!(
        handle.overrides().unwrap()[&LogicalControl::Encoder(87)].encoder_mode(),
        Some(EncoderMode::SignMagnitude)
    );

    router.handle_frame(&[0xB0, 87, 5], 0);
    assert!((router.params().get(ParamKey::Spread) - 5.0 * ENCODER_SENSITIVITY).abs() < 1e-5);
    router.handle_frame(&[0xB0, 87, 0x42], 0);
    assert!((router.params().get(ParamKey::Spread) - 3.0 * ENCODER_SENSITIVITY).abs() < 1e-5);

    router.set_encoder_mode(LogicalControl::Encoder(87), None).unwrap();
    assert_eq!(router.encoder_mode(87), None);
    assert!(handle.overrides().unwrap().is_empty());
}

#[test]
fn pad_cannot_be_bound_to_a_controller() {
    let (mut router, handle) = router();
    assert!(router.set_binding(LogicalControl::Pad(0), PhysicalBinding::cc(0, 14)).is_err());

    let out = router.handle_frame(&[0x90, 14, 100], 0).unwrap();
    assert!(matches!(out.routed, Routed::Unmatched(_)));
    assert_eq!(router.bindings().pad_for_note(8, 36), Some(0));
    assert!(handle.text().is_none());
}

#[test]
fn slider_wins_over_encoder_on_shared_controller() {
    let (mut router, _) = router();
    router.set_binding(LogicalControl::Encoder(86), PhysicalBinding::cc(0, 14)).unwrap();
    let out = router.handle_frame(&[0xB0, 14, 127], 0).unwrap();
    match out.routed {
        Routed::Parameter(change) => assert_eq!(change.key, ParamKey::Complexity),
        other => panic!("expected slider change, got {other:?}"),
    }
    assert_eq!(router.encoder_mode(14), None);
}

#[test]
fn reset_restores_defaults_and_survives_reload() {
    let (mut router, handle) = router();
    router.set_binding(LogicalControl::Pad(0), PhysicalBinding::note(0, 70)).unwrap();
    router
        .set_binding(LogicalControl::Slider(ParamKey::Spread), PhysicalBinding::cc(0, 70))
        .unwrap();

    let reloaded = BindingStore::load(Box::new(handle.clone()));
    assert_eq!(reloaded.pad_for_note(0, 70), Some(0));
    assert_eq!(reloaded.slider_for_cc(0, 70), Some(ParamKey::Spread));

    router.reset_binding(Some(&LogicalControl::Pad(0)));
    assert_eq!(router.bindings().pad_for_note(8, 36), Some(0));
    router.reset_binding(None);
    router.reset_binding(None);
    assert!(handle.overrides().unwrap().is_empty());
    assert_eq!(router.bindings().slider_for_cc(0, 15), Some(ParamKey::Spread));
}

#[test]
fn binding_changes_are_broadcast() {
    let (mut router, _) = router();
    let rx = router.subscribe();
    router.arm_learn(LogicalControl::Pad(5));
    router.handle_frame(&[0x90, 72, 1], 0);
    assert!(rx.try_recv().is_ok());
}

#[test]
fn refresh_redraws_everything() {
    let (mut router, _) = router();
    router.handle_frame(&[0x98, 36, 100], 0);
    let frames = router.refresh();
    assert_eq!(frames.len(), 8 + 1);
    assert!(is_oled_frame(frames.last().unwrap()));
}

#[test]
fn learned_bindings_survive_restart_on_disk() {
    use chordlab_library::persistence::JsonFileStore;

    let dir = tempfile::tempdir().unwrap();
    let store = BindingStore::load(Box::new(JsonFileStore::new(dir.path())));
    let mut router = ControlRouter::new(store, DEFAULT_PAD_LED_BASE);
    router.arm_learn(LogicalControl::Slider(ParamKey::Octave));
    router.handle_frame(&[0xB3, 7, 10], 0);

    let text = std::fs::read_to_string(dir.path().join("chordlab-bindings.json")).unwrap();
    assert!(text.contains("slider:octave"));

    let store = BindingStore::load(Box::new(JsonFileStore::new(dir.path())));
    let router = ControlRouter::new(store, DEFAULT_PAD_LED_BASE);
    assert_eq!(router.bindings().slider_for_cc(3, 7), Some(ParamKey::Octave));
    assert_eq!(router.bindings().slider_for_cc(0, 30), None);
}
