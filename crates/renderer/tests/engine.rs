use std::time::Duration;

use renderer::engine::{start_with_clock, Status, TickOutcome, Visualization};
use renderer::{
    ClientRect, EventHub, FrameError, HeadlessGraphics, HeadlessSurface, HostEvent, LoopState,
    ManualScheduler, ManualTimeSource, PhysicalSize, PointerOrigin, RenderError, TextureBinding,
    TextureImage, UniformDecl, UniformSource, UniformType, UniformValue, Viewport,
    VisualizationSpec,
};

const FRAME: Duration = Duration::from_micros(16_667);

const GRADIENT: &str = r#"
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / u_resolution.xy;
    fragColor = vec4(uv, 0.5 + 0.5 * sin(u_time), 1.0);
}
"#;

fn gradient_spec() -> VisualizationSpec {
    VisualizationSpec::new("gradient", GRADIENT)
        .with_uniform(UniformDecl::new(
            "u_resolution",
            UniformType::Vec2,
            UniformSource::Resolution,
        ))
        .with_uniform(UniformDecl::new(
            "u_time",
            UniformType::Float,
            UniformSource::ElapsedTime,
        ))
        .with_uniform(UniformDecl::new(
            "u_mouse",
            UniformType::Vec2,
            UniformSource::Pointer,
        ))
}

struct Harness {
    host: HeadlessSurface,
    scheduler: ManualScheduler,
    time: ManualTimeSource,
    events: EventHub,
}

impl Harness {
    fn new(viewport: Viewport) -> Self {
        Self {
            host: HeadlessSurface::new(viewport),
            scheduler: ManualScheduler::new(),
            time: ManualTimeSource::new(),
            events: EventHub::new(),
        }
    }

    fn start(&self, spec: VisualizationSpec) -> Visualization<HeadlessGraphics, ManualScheduler> {
        start_with_clock(
            &self.host,
            spec,
            self.scheduler.clone(),
            self.events.clone(),
            Box::new(self.time.clone()),
        )
    }

    /// Advances one refresh and delivers every frame that became due.
    fn step(
        &self,
        visualization: &mut Visualization<HeadlessGraphics, ManualScheduler>,
    ) -> Vec<TickOutcome> {
        self.time.advance(FRAME);
        self.scheduler
            .advance(FRAME)
            .into_iter()
            .map(|token| visualization.on_frame(token))
            .collect()
    }
}

fn vec2(values: Option<UniformValue>) -> [f32; 2] {
    match values {
        Some(UniformValue::Vec2(value)) => value,
        other => panic!("expected vec2, got {other:?}"),
    }
}

#[test]
fn started_instance_draws_once_per_refresh() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut viz = harness.start(gradient_spec());
    assert_eq!(viz.status(), &Status::Running);
    assert_eq!(viz.loop_state(), LoopState::Running);

    for _ in 0..3 {
        assert_eq!(harness.step(&mut viz), vec![TickOutcome::Drawn]);
    }
    let stats = harness.host.stats();
    assert_eq!(stats.draw_calls, 3);
    assert_eq!(stats.clears, 3);
    assert_eq!(stats.clear_color, Some([0.0, 0.0, 0.0, 1.0]));
    assert_eq!(harness.scheduler.pending(), 1);
}

#[test]
fn resize_to_same_size_is_idempotent() {
    let harness = Harness::new(Viewport::new(640.0, 480.0, 1.0));
    let mut viz = harness.start(gradient_spec());
    assert_eq!(harness.host.stats().viewport_updates, 1);

    let same = HostEvent::Resized {
        viewport: Viewport::new(640.0, 480.0, 1.0),
        rect: ClientRect {
            left: 0.0,
            top: 0.0,
            width: 640.0,
            height: 480.0,
        },
    };
    harness.events.dispatch(same);
    harness.step(&mut viz);
    harness.events.dispatch(same);
    harness.step(&mut viz);
    assert_eq!(harness.host.stats().viewport_updates, 1);

    harness.events.dispatch(HostEvent::Resized {
        viewport: Viewport::new(1024.0, 768.0, 1.0),
        rect: ClientRect::default(),
    });
    harness.step(&mut viz);
    let stats = harness.host.stats();
    assert_eq!(stats.viewport_updates, 2);
    assert_eq!(stats.viewport, Some(PhysicalSize::new(1024, 768)));
}

#[test]
fn resolution_uniform_is_in_physical_pixels() {
    let harness = Harness::new(Viewport::new(800.0, 600.0, 2.0));
    let mut viz = harness.start(gradient_spec());
    harness.step(&mut viz);

    let stats = harness.host.stats();
    assert_eq!(stats.draw_calls, 1);
    let uniforms = stats.last_uniforms().expect("uniforms recorded");
    assert_eq!(vec2(uniforms.get("u_resolution")), [1600.0, 1200.0]);
    assert_eq!(stats.viewport, Some(PhysicalSize::new(1600, 1200)));
}

#[test]
fn pixel_ratio_cap_limits_resolution() {
    let harness = Harness::new(Viewport::new(800.0, 600.0, 3.0));
    let mut spec = gradient_spec();
    spec.max_pixel_ratio = Some(1.5);
    let mut viz = harness.start(spec);
    harness.step(&mut viz);
    let stats = harness.host.stats();
    let uniforms = stats.last_uniforms().expect("uniforms recorded");
    assert_eq!(vec2(uniforms.get("u_resolution")), [1200.0, 900.0]);
}

#[test]
fn latest_pointer_position_wins() {
    let harness = Harness::new(Viewport::new(800.0, 600.0, 1.0));
    let mut viz = harness.start(gradient_spec());

    harness.events.dispatch(HostEvent::PointerMoved {
        client_x: 100.0,
        client_y: 50.0,
    });
    harness.events.dispatch(HostEvent::PointerMoved {
        client_x: 200.0,
        client_y: 150.0,
    });
    harness.step(&mut viz);

    let stats = harness.host.stats();
    let uniforms = stats.last_uniforms().expect("uniforms recorded");
    assert_eq!(vec2(uniforms.get("u_mouse")), [200.0, 450.0]);
}

#[test]
fn pointer_before_any_move_reads_as_origin() {
    let harness = Harness::new(Viewport::new(800.0, 600.0, 1.0));
    let mut viz = harness.start(gradient_spec());
    harness.step(&mut viz);
    let stats = harness.host.stats();
    let uniforms = stats.last_uniforms().expect("uniforms recorded");
    assert_eq!(vec2(uniforms.get("u_mouse")), [0.0, 0.0]);
}

#[test]
fn top_left_pointer_is_offset_by_client_rect() {
    let harness = Harness {
        host: HeadlessSurface::new(Viewport::new(400.0, 300.0, 2.0)).with_client_rect(
            ClientRect {
                left: 10.0,
                top: 20.0,
                width: 400.0,
                height: 300.0,
            },
        ),
        scheduler: ManualScheduler::new(),
        time: ManualTimeSource::new(),
        events: EventHub::new(),
    };
    let mut spec = gradient_spec();
    spec.pointer_origin = PointerOrigin::TopLeft;
    let mut viz = harness.start(spec);
    harness.events.dispatch(HostEvent::PointerMoved {
        client_x: 60.0,
        client_y: 70.0,
    });
    harness.step(&mut viz);
    let stats = harness.host.stats();
    let uniforms = stats.last_uniforms().expect("uniforms recorded");
    assert_eq!(vec2(uniforms.get("u_mouse")), [100.0, 100.0]);
}

#[test]
fn elapsed_time_starts_at_link() {
    let harness = Harness::new(Viewport::new(64.0, 64.0, 1.0));
    harness.time.set(42.0);
    let mut viz = harness.start(gradient_spec());
    harness.step(&mut viz);
    harness.step(&mut viz);
    let stats = harness.host.stats();
    let times: Vec<f32> = stats
        .drawn_uniforms
        .iter()
        .map(|set| match set.get("u_time") {
            Some(UniformValue::Float(value)) => value,
            other => panic!("expected float, got {other:?}"),
        })
        .collect();
    assert_eq!(times.len(), 2);
    assert!((times[0] - FRAME.as_secs_f32()).abs() < 1e-4);
    assert!(times[1] > times[0]);
}

#[test]
fn teardown_is_idempotent() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut viz = harness.start(gradient_spec());
    harness.step(&mut viz);

    viz.stop();
    let after_first = harness.host.stats();
    viz.stop();
    renderer::stop(&mut viz);
    let after_third = harness.host.stats();

    assert_eq!(after_first, after_third);
    assert_eq!(after_third.live_objects(), 0);
    assert_eq!(after_third.contexts_released, 1);
    assert_eq!(after_third.invalid_calls, 0);
    assert_eq!(viz.status(), &Status::Stopped);
    assert_eq!(viz.loop_state(), LoopState::Stopped);
    assert_eq!(harness.events.listener_count(), 0);
}

#[test]
fn stop_with_pending_frame_draws_nothing_more() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut viz = harness.start(gradient_spec());
    harness.step(&mut viz);
    let stale = viz.pending_frame().expect("next frame requested");

    viz.stop();
    assert_eq!(harness.scheduler.cancelled(), 1);
    assert!(harness.step(&mut viz).is_empty());
    assert_eq!(viz.on_frame(stale), TickOutcome::Stale);

    let stats = harness.host.stats();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.invalid_calls, 0);
}

#[test]
fn link_failure_never_runs() {
    let harness = Harness {
        host: HeadlessSurface::new(Viewport::new(320.0, 240.0, 1.0)).with_link_failure(),
        scheduler: ManualScheduler::new(),
        time: ManualTimeSource::new(),
        events: EventHub::new(),
    };
    let mut viz = harness.start(gradient_spec());

    assert!(matches!(viz.status(), Status::Failed(RenderError::Link { .. })));
    assert_ne!(viz.loop_state(), LoopState::Running);
    assert_eq!(harness.scheduler.requested(), 0);
    assert!(harness.step(&mut viz).is_empty());

    let stats = harness.host.stats();
    assert_eq!(stats.draw_calls, 0);
    assert_eq!(stats.live_objects(), 0);
}

#[test]
fn compile_error_reports_log_and_releases_everything() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let broken = VisualizationSpec::new(
        "broken",
        "void mainImage(out vec4 fragColor, in vec2 fragCoord) {\n    fragColor = vec4(1.0);\n",
    );
    let viz = harness.start(broken);

    match viz.status() {
        Status::Failed(err @ RenderError::Compile { .. }) => {
            assert!(!err.log().unwrap_or_default().is_empty());
        }
        other => panic!("expected compile failure, got {other:?}"),
    }
    let stats = harness.host.stats();
    assert_eq!(stats.draw_calls, 0);
    assert_eq!(stats.live_objects(), 0);
    assert_eq!(harness.events.listener_count(), 0);
}

#[test]
fn missing_graphics_leaves_loop_uninitialized() {
    let harness = Harness {
        host: HeadlessSurface::new(Viewport::new(320.0, 240.0, 1.0)).without_graphics(),
        scheduler: ManualScheduler::new(),
        time: ManualTimeSource::new(),
        events: EventHub::new(),
    };
    let viz = harness.start(gradient_spec());
    assert!(matches!(
        viz.status(),
        Status::Failed(RenderError::NoGraphicsSupport(_))
    ));
    assert_eq!(viz.loop_state(), LoopState::Uninitialized);
    assert_eq!(harness.host.stats().contexts_acquired, 0);
}

#[test]
fn hidden_instance_keeps_ticking_without_drawing() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut viz = harness.start(gradient_spec());
    viz.set_visible(false);
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Deferred]);
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Deferred]);
    assert_eq!(harness.host.stats().draw_calls, 0);

    viz.set_visible(true);
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Drawn]);
    assert_eq!(harness.host.stats().draw_calls, 1);
}

#[test]
fn frame_cap_skips_early_ticks() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut spec = gradient_spec();
    spec.max_fps = Some(30.0);
    let mut viz = harness.start(spec);

    let outcomes: Vec<TickOutcome> = (0..4).flat_map(|_| harness.step(&mut viz)).collect();
    assert_eq!(
        outcomes,
        vec![
            TickOutcome::Drawn,
            TickOutcome::Deferred,
            TickOutcome::Drawn,
            TickOutcome::Deferred,
        ]
    );
    assert!(viz.time_until_draw().is_some());
}

#[test]
fn recoverable_frame_error_reconfigures_and_continues() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut viz = harness.start(gradient_spec());
    harness
        .host
        .inject_frame_error(FrameError::Recoverable("outdated".to_string()));

    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Recovered]);
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Drawn]);
    let stats = harness.host.stats();
    assert_eq!(stats.reconfigures, 1);
    assert_eq!(stats.draw_calls, 1);
    assert!(viz.is_running());
}

#[test]
fn fatal_frame_error_stops_and_releases() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut viz = harness.start(gradient_spec());
    harness
        .host
        .inject_frame_error(FrameError::Fatal("device lost".to_string()));

    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Failed]);
    assert!(matches!(viz.status(), Status::Failed(RenderError::Frame(_))));
    assert_eq!(viz.pending_frame(), None);
    assert!(harness.step(&mut viz).is_empty());
    assert_eq!(harness.host.stats().live_objects(), 0);
}

#[test]
fn texture_is_bound_and_released() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let image = TextureImage {
        width: 4,
        height: 2,
        rgb: vec![128; 4 * 2 * 3],
    };
    let spec = VisualizationSpec::new(
        "textured",
        "void mainImage(out vec4 c, in vec2 f) { c = texture(iChannel0, f / 4.0); }",
    )
    .with_uniform(UniformDecl::new(
        "iChannelResolution0",
        UniformType::Vec3,
        UniformSource::TextureResolution,
    ))
    .with_texture(TextureBinding {
        sampler: "iChannel0".to_string(),
        image,
    });
    let mut viz = harness.start(spec);
    harness.step(&mut viz);

    let stats = harness.host.stats();
    assert_eq!(stats.textures_created, 1);
    let uniforms = stats.last_uniforms().expect("uniforms recorded");
    assert_eq!(uniforms.get("iChannel0"), Some(UniformValue::Sampler(0)));
    assert_eq!(
        uniforms.get("iChannelResolution0"),
        Some(UniformValue::Vec3([4.0, 2.0, 1.0]))
    );

    viz.stop();
    let stats = harness.host.stats();
    assert_eq!(stats.textures_deleted, 1);
    assert_eq!(stats.live_objects(), 0);
}

#[test]
fn instances_sharing_events_are_independent() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut first = harness.start(gradient_spec());
    let second_host = HeadlessSurface::new(Viewport::new(320.0, 240.0, 1.0));
    let mut second = start_with_clock(
        &second_host,
        gradient_spec(),
        harness.scheduler.clone(),
        harness.events.clone(),
        Box::new(harness.time.clone()),
    );
    assert_eq!(harness.events.listener_count(), 4);

    first.stop();
    assert_eq!(harness.events.listener_count(), 2);

    harness.events.dispatch(HostEvent::PointerMoved {
        client_x: 10.0,
        client_y: 40.0,
    });
    harness.time.advance(FRAME);
    for token in harness.scheduler.advance(FRAME) {
        assert_eq!(first.on_frame(token), TickOutcome::Stale);
        second.on_frame(token);
    }
    let stats = second_host.stats();
    assert_eq!(stats.draw_calls, 1);
    let uniforms = stats.last_uniforms().expect("uniforms recorded");
    assert_eq!(vec2(uniforms.get("u_mouse")), [10.0, 200.0]);
}

#[test]
fn dropping_an_instance_releases_it() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    {
        let mut viz = harness.start(gradient_spec());
        harness.step(&mut viz);
    }
    let stats = harness.host.stats();
    assert_eq!(stats.live_objects(), 0);
    assert_eq!(harness.scheduler.pending(), 0);
}

fn resized(width: f64, height: f64, ratio: f64) -> HostEvent {
    HostEvent::Resized {
        viewport: Viewport::new(width, height, ratio),
        rect: ClientRect {
            left: 0.0,
            top: 0.0,
            width,
            height,
        },
    }
}

#[test]
fn resize_reaches_next_drawn_frame() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut viz = harness.start(gradient_spec());
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Drawn]);

    harness.events.dispatch(resized(500.0, 400.0, 2.0));
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Drawn]);

    let stats = harness.host.stats();
    assert_eq!(stats.viewport, Some(PhysicalSize::new(1000, 800)));
    let resolutions: Vec<[f32; 2]> = stats
        .drawn_uniforms
        .iter()
        .map(|set| vec2(set.get("u_resolution")))
        .collect();
    assert_eq!(resolutions, vec![[320.0, 240.0], [1000.0, 800.0]]);
    assert_eq!(
        viz.surface().map(|surface| surface.physical_size()),
        Some(PhysicalSize::new(1000, 800))
    );
}

#[test]
fn resize_during_capped_tick_is_applied_before_next_draw() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut spec = gradient_spec();
    spec.max_fps = Some(30.0);
    let mut viz = harness.start(spec);
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Drawn]);

    harness.events.dispatch(resized(200.0, 100.0, 1.0));
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Deferred]);
    let stats = harness.host.stats();
    assert_eq!(stats.viewport, Some(PhysicalSize::new(200, 100)));
    assert_eq!(stats.draw_calls, 1);

    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Drawn]);
    let stats = harness.host.stats();
    let uniforms = stats.last_uniforms().expect("uniforms recorded");
    assert_eq!(vec2(uniforms.get("u_resolution")), [200.0, 100.0]);
}

#[test]
fn resize_while_hidden_is_current_when_shown() {
    let harness = Harness::new(Viewport::new(320.0, 240.0, 1.0));
    let mut viz = harness.start(gradient_spec());
    viz.set_visible(false);

    harness.events.dispatch(resized(640.0, 360.0, 1.5));
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Deferred]);
    assert_eq!(
        harness.host.stats().viewport,
        Some(PhysicalSize::new(960, 540))
    );

    viz.set_visible(true);
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Drawn]);
    let stats = harness.host.stats();
    assert_eq!(stats.draw_calls, 1);
    let uniforms = stats.last_uniforms().expect("uniforms recorded");
    assert_eq!(vec2(uniforms.get("u_resolution")), [960.0, 540.0]);
}

#[test]
fn negligible_frame_cap_saturates_wait() {
    let harness = Harness::new(Viewport::new(64.0, 64.0, 1.0));
    let mut spec = gradient_spec();
    spec.max_fps = Some(1e-30);
    let mut viz = harness.start(spec);

    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Drawn]);
    assert_eq!(harness.step(&mut viz), vec![TickOutcome::Deferred]);
    assert_eq!(viz.time_until_draw(), Some(Duration::MAX));
}
